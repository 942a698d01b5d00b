//! Error taxonomy for the registration flow.
//!
//! Validation and OTP errors are recoverable and shown to the caller verbatim.
//! Storage errors keep their cause for server-side logs only; their `Display`
//! is a fixed, generic message.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

use super::flow::StateKind;

/// Form fields that can carry a field-level error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    PrimaryId,
    OtpCode,
    SecondaryId,
    Payload,
}

impl Field {
    /// Wire name used in request bodies and field-error maps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryId => "primaryId",
            Self::OtpCode => "code",
            Self::SecondaryId => "secondaryId",
            Self::Payload => "payload",
        }
    }

    const fn missing_message(self) -> &'static str {
        match self {
            Self::PrimaryId => "Primary ID is required",
            Self::OtpCode => "OTP is required",
            Self::SecondaryId => "Secondary ID is required",
            Self::Payload => "Missing payload",
        }
    }

    const fn malformed_message(self) -> &'static str {
        match self {
            Self::PrimaryId => "Invalid primary ID format",
            Self::OtpCode => "OTP must be 6 digits",
            Self::SecondaryId => "Invalid secondary ID format",
            Self::Payload => "Invalid payload",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{}", .0.missing_message())]
    Missing(Field),
    #[error("{}", .0.malformed_message())]
    Malformed(Field),
    #[error("Invalid payload: {0}")]
    Payload(String),
}

impl ValidationError {
    /// The field this error should be attached to in the form.
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::Missing(field) | Self::Malformed(field) => *field,
            Self::Payload(_) => Field::Payload,
        }
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("No OTP generated for this primary ID")]
    NotFound,
    #[error("OTP expired")]
    Expired,
    #[error("Invalid OTP")]
    Mismatch,
}

/// Failure of an external collaborator (database, delivery channel).
#[derive(Debug, Error)]
#[error("Server error")]
pub struct StorageError {
    #[source]
    source: Box<dyn StdError + Send + Sync>,
}

impl StorageError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Underlying cause, for logging.
    #[must_use]
    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error("Primary ID has not been verified")]
    NotVerified,
    #[error("Step not allowed while {actual}; expected {expected}")]
    OutOfOrder {
        expected: StateKind,
        actual: StateKind,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FlowError {
    /// Field-level error, if this failure belongs to a single form field.
    #[must_use]
    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Validation(err) => Some(err.field()),
            Self::Otp(_) => Some(Field::OtpCode),
            Self::NotVerified => Some(Field::PrimaryId),
            Self::OutOfOrder { .. } | Self::Storage(_) => None,
        }
    }
}
