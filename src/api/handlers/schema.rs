//! Form description served to the renderer.
//!
//! Patterns come from the same constants the server validates with, so a field
//! that passes client-side checks cannot be rejected for its format later.

use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::registration::{pincode::PINCODE_PATTERN, validators, StateKind};

const PRIMARY_STEP: u8 = StateKind::AwaitingPrimary.step();
const OTP_STEP: u8 = StateKind::AwaitingOtp.step();
const SECONDARY_STEP: u8 = StateKind::AwaitingSecondary.step();

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldValidation {
    pub pattern: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub label: String,
    pub step: u8,
    #[serde(rename = "type")]
    pub kind: String,
    pub placeholder: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
}

struct FieldDef {
    name: &'static str,
    label: &'static str,
    step: u8,
    placeholder: &'static str,
    required: bool,
    validation: Option<(&'static str, &'static str)>,
}

const FIELDS: &[FieldDef] = &[
    FieldDef {
        name: "primaryId",
        label: "Aadhaar Number",
        step: PRIMARY_STEP,
        placeholder: "Enter your 12-digit Aadhaar number",
        required: true,
        validation: Some((
            validators::PRIMARY_ID_PATTERN,
            "Aadhaar number must be 12 digits long.",
        )),
    },
    FieldDef {
        name: "udyamNumber",
        label: "Udyam Registration Number",
        step: PRIMARY_STEP,
        placeholder: "Enter your Udyam Registration Number",
        required: false,
        validation: None,
    },
    FieldDef {
        name: "code",
        label: "OTP",
        step: OTP_STEP,
        placeholder: "Enter the OTP received",
        required: true,
        validation: Some((validators::OTP_CODE_PATTERN, "OTP must be 6 digits long.")),
    },
    FieldDef {
        name: "secondaryId",
        label: "PAN Number",
        step: SECONDARY_STEP,
        placeholder: "Enter your PAN number",
        required: true,
        validation: Some((
            validators::SECONDARY_ID_PATTERN,
            "PAN must be 10 upper-case characters in the format ABCDE1234F.",
        )),
    },
    FieldDef {
        name: "pinCode",
        label: "PIN Code",
        step: SECONDARY_STEP,
        placeholder: "Enter your 6-digit PIN code",
        required: false,
        validation: Some((PINCODE_PATTERN, "PIN code must be 6 digits long.")),
    },
    FieldDef {
        name: "city",
        label: "City",
        step: SECONDARY_STEP,
        placeholder: "City",
        required: false,
        validation: None,
    },
    FieldDef {
        name: "state",
        label: "State",
        step: SECONDARY_STEP,
        placeholder: "State",
        required: false,
        validation: None,
    },
];

#[must_use]
pub fn form_fields() -> Vec<FieldSchema> {
    FIELDS
        .iter()
        .map(|def| FieldSchema {
            name: def.name.to_string(),
            label: def.label.to_string(),
            step: def.step,
            kind: "text".to_string(),
            placeholder: def.placeholder.to_string(),
            required: def.required,
            validation: def.validation.map(|(pattern, message)| FieldValidation {
                pattern: pattern.to_string(),
                message: message.to_string(),
            }),
        })
        .collect()
}

#[utoipa::path(
    get,
    path = "/api/schema",
    responses (
        (status = 200, description = "Registration form fields, in display order", body = [FieldSchema]),
    ),
    tag = "registration"
)]
pub async fn schema() -> Json<Vec<FieldSchema>> {
    Json(form_fields())
}
