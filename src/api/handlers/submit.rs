use axum::{extract::Extension, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ErrorBody, SERVER_ERROR};
use crate::registration::{
    Collaborators, Field, FlowError, Payload, SubmissionId, VerificationFlow,
};

/// Keys the primary ID may arrive under, in lookup order.
pub const PRIMARY_ID_KEYS: &[&str] = &["primaryId", "aadhaarNumber", "aadhaar"];
/// Keys the secondary ID may arrive under, in lookup order.
pub const SECONDARY_ID_KEYS: &[&str] = &["secondaryId", "pan"];

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: String,
}

impl From<SubmissionId> for SubmitResponse {
    fn from(id: SubmissionId) -> Self {
        Self {
            success: true,
            id: id.to_string(),
        }
    }
}

/// Example body; every other flat field is stored verbatim with the submission.
#[derive(ToSchema)]
#[allow(dead_code)]
#[schema(rename_all = "camelCase", example = json!({
    "primaryId": "123456789012",
    "secondaryId": "ABCDE1234F",
    "udyamNumber": "UDYAM-XX-00-0000000",
    "pinCode": "110001",
    "city": "Central Delhi",
    "state": "Delhi"
}))]
pub struct SubmitRequest {
    primary_id: String,
    secondary_id: String,
}

#[utoipa::path(
    post,
    path = "/api/submit",
    request_body = SubmitRequest,
    responses (
        (status = 200, description = "Submission recorded", body = SubmitResponse),
        (status = 400, description = "Malformed identifiers or payload", body = ErrorBody),
        (status = 403, description = "Primary ID has not passed OTP verification", body = ErrorBody),
        (status = 500, description = "Submission could not be stored", body = ErrorBody),
    ),
    tag = "registration"
)]
#[instrument(skip_all)]
pub async fn submit(
    collaborators: Extension<Collaborators>,
    payload: Option<Json<Value>>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Some(Json(body)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let payload = Payload::try_from(body).map_err(FlowError::from)?;
    debug!(fields = payload.len(), "submission received");

    let primary_id = payload
        .identifier(PRIMARY_ID_KEYS, Field::PrimaryId)
        .map_err(FlowError::from)?;
    // Secondary ID errors surface only after the verification check.
    let secondary_id = payload
        .identifier(SECONDARY_ID_KEYS, Field::SecondaryId)
        .map(str::to_string);

    let mut flow = VerificationFlow::resume_verified(collaborators.0, primary_id)?;
    let secondary_id = secondary_id.map_err(FlowError::from)?;
    let step = flow.submit_secondary(&secondary_id, payload).await?;

    step.record_id.map(|id| Json(id.into())).ok_or_else(|| {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
    })
}
