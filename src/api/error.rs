use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::registration::FlowError;

pub const MISSING_PAYLOAD: &str = "Missing payload";
pub const SERVER_ERROR: &str = "Server error";

/// Body of every failed `/api/*` response.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    /// Form field the error belongs to, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                field: None,
            },
        }
    }

    #[must_use]
    pub fn missing_payload() -> Self {
        Self::new(StatusCode::BAD_REQUEST, MISSING_PAYLOAD)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FlowError> for ApiError {
    /// Validation and OTP failures are the caller's to fix (400), a missing
    /// verification is refused (403) and storage failures only ever surface as
    /// a generic 500. The flow has already logged their cause.
    fn from(err: FlowError) -> Self {
        let status = match &err {
            FlowError::Validation(_) | FlowError::Otp(_) => StatusCode::BAD_REQUEST,
            FlowError::NotVerified => StatusCode::FORBIDDEN,
            FlowError::OutOfOrder { .. } => StatusCode::CONFLICT,
            FlowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                field: err.field().map(|field| field.as_str().to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::{Field, OtpError, StorageError, ValidationError};

    #[test]
    fn flow_errors_map_to_status_codes() {
        let cases = [
            (
                FlowError::from(ValidationError::Malformed(Field::PrimaryId)),
                StatusCode::BAD_REQUEST,
                "Invalid primary ID format",
                Some("primaryId"),
            ),
            (
                FlowError::from(OtpError::Expired),
                StatusCode::BAD_REQUEST,
                "OTP expired",
                Some("code"),
            ),
            (
                FlowError::NotVerified,
                StatusCode::FORBIDDEN,
                "Primary ID has not been verified",
                Some("primaryId"),
            ),
            (
                FlowError::from(StorageError::new("relation \"submissions\" does not exist")),
                StatusCode::INTERNAL_SERVER_ERROR,
                SERVER_ERROR,
                None,
            ),
        ];

        for (err, status, message, field) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.body.error, message);
            assert_eq!(api.body.field.as_deref(), field);
        }
    }

    #[test]
    fn field_is_omitted_when_absent() -> anyhow::Result<()> {
        let body = serde_json::to_value(ApiError::missing_payload().body)?;
        assert_eq!(body, serde_json::json!({ "error": "Missing payload" }));
        Ok(())
    }
}
