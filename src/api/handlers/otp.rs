use axum::{extract::Extension, response::Json};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ErrorBody};
use crate::registration::{Collaborators, Step, VerificationFlow};

#[derive(ToSchema, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOtpRequest {
    /// 12-digit primary ID. `aadhaarNumber` and `aadhaar` are accepted too.
    #[serde(default, alias = "aadhaarNumber", alias = "aadhaar")]
    pub primary_id: Option<String>,
}

#[derive(ToSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    #[serde(default, alias = "aadhaarNumber", alias = "aadhaar")]
    pub primary_id: Option<String>,
    /// 6-digit code. `otp` is accepted too.
    #[serde(default, alias = "otp")]
    pub code: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
}

impl From<Step> for MessageBody {
    fn from(step: Step) -> Self {
        Self {
            message: step.message.to_string(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/generate-otp",
    request_body = GenerateOtpRequest,
    responses (
        (status = 200, description = "OTP issued and delivered", body = MessageBody),
        (status = 400, description = "Missing or malformed primary ID", body = ErrorBody),
        (status = 500, description = "OTP could not be delivered", body = ErrorBody),
    ),
    tag = "registration"
)]
#[instrument(skip_all)]
pub async fn generate_otp(
    collaborators: Extension<Collaborators>,
    payload: Option<Json<GenerateOtpRequest>>,
) -> Result<Json<MessageBody>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let mut flow = VerificationFlow::new(collaborators.0);
    let step = flow.submit_primary(request.primary_id.as_deref().unwrap_or_default())?;

    Ok(Json(step.into()))
}

#[utoipa::path(
    post,
    path = "/api/verify-otp",
    request_body = VerifyOtpRequest,
    responses (
        (status = 200, description = "OTP verified", body = MessageBody),
        (status = 400, description = "Malformed input, or no live OTP matches", body = ErrorBody),
    ),
    tag = "registration"
)]
#[instrument(skip_all)]
pub async fn verify_otp(
    collaborators: Extension<Collaborators>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Json<MessageBody>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::missing_payload());
    };

    let mut flow = VerificationFlow::resume_awaiting_otp(
        collaborators.0,
        request.primary_id.as_deref().unwrap_or_default(),
    )?;
    let step = flow.submit_otp(request.code.as_deref().unwrap_or_default())?;

    Ok(Json(step.into()))
}
