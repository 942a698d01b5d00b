//! Durable record of completed registrations.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::error::StorageError;
use super::payload::Payload;
use super::validators::{PrimaryId, SecondaryId};

/// Opaque id assigned to a submission when it is recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub id: SubmissionId,
    pub primary_id: PrimaryId,
    pub secondary_id: SecondaryId,
    pub payload: Payload,
    #[serde(skip)]
    pub created_at: SystemTime,
}

#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Persist one submission and return its id.
    ///
    /// # Errors
    /// Returns a `StorageError` when the backing store fails; the cause is
    /// meant for logs only.
    async fn record(
        &self,
        primary_id: &PrimaryId,
        secondary_id: &SecondaryId,
        payload: &Payload,
    ) -> Result<SubmissionId, StorageError>;
}

/// Postgres-backed sink writing to the `submissions` table.
#[derive(Clone, Debug)]
pub struct PgSubmissionSink {
    pool: PgPool,
}

impl PgSubmissionSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionSink for PgSubmissionSink {
    async fn record(
        &self,
        primary_id: &PrimaryId,
        secondary_id: &SecondaryId,
        payload: &Payload,
    ) -> Result<SubmissionId, StorageError> {
        let id = SubmissionId::generate();
        let payload_text = payload.to_json_string().map_err(StorageError::new)?;

        let query = r"
            INSERT INTO submissions
                (id, primary_id, secondary_id, payload)
            VALUES ($1, $2, $3, $4::jsonb)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id.as_uuid())
            .bind(primary_id.as_str())
            .bind(secondary_id.as_str())
            .bind(payload_text)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StorageError::new)?;

        Ok(id)
    }
}

/// In-memory sink for tests and local demos.
#[derive(Debug, Default)]
pub struct MemorySubmissionSink {
    records: Mutex<Vec<SubmissionRecord>>,
}

impl MemorySubmissionSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SubmissionSink for MemorySubmissionSink {
    async fn record(
        &self,
        primary_id: &PrimaryId,
        secondary_id: &SecondaryId,
        payload: &Payload,
    ) -> Result<SubmissionId, StorageError> {
        let record = SubmissionRecord {
            id: SubmissionId::generate(),
            primary_id: primary_id.clone(),
            secondary_id: secondary_id.clone(),
            payload: payload.clone(),
            created_at: SystemTime::now(),
        };
        let id = record.id;
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(id)
    }
}
