use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::Json,
};
use tracing::{error, instrument};

use crate::api::error::{ApiError, ErrorBody};
use crate::registration::pincode::{is_valid_pincode, Locality, PincodeClient};

#[utoipa::path(
    get,
    path = "/api/pincode/{pin}",
    params(
        ("pin" = String, Path, description = "6-digit postal code")
    ),
    responses (
        (status = 200, description = "City and state for the postal code", body = Locality),
        (status = 400, description = "Malformed postal code", body = ErrorBody),
        (status = 404, description = "Unknown postal code", body = ErrorBody),
        (status = 502, description = "Lookup service unavailable", body = ErrorBody),
    ),
    tag = "registration"
)]
#[instrument(skip(client))]
pub async fn lookup(
    client: Extension<PincodeClient>,
    Path(pin): Path<String>,
) -> Result<Json<Locality>, ApiError> {
    if !is_valid_pincode(&pin) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "PIN code must be 6 digits",
        ));
    }

    match client.lookup(&pin).await {
        Ok(Some(locality)) => Ok(Json(locality)),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, "Unknown PIN code")),
        Err(err) => {
            error!("Pincode lookup failed: {err:#}");
            Err(ApiError::new(
                StatusCode::BAD_GATEWAY,
                "PIN code lookup unavailable",
            ))
        }
    }
}
