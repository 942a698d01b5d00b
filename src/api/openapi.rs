#![allow(clippy::needless_for_each)]

use utoipa::openapi::{Contact, License};
use utoipa::OpenApi;

use super::error::ErrorBody;
use super::handlers::{health, otp, pincode, schema, submit};
use crate::registration::Locality;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        otp::generate_otp,
        otp::verify_otp,
        submit::submit,
        schema::schema,
        pincode::lookup,
    ),
    components(
        schemas(
            health::Health,
            otp::GenerateOtpRequest,
            otp::VerifyOtpRequest,
            otp::MessageBody,
            submit::SubmitRequest,
            submit::SubmitResponse,
            schema::FieldSchema,
            schema::FieldValidation,
            Locality,
            ErrorBody,
        )
    ),
    tags(
        (name = "registration", description = "Primary ID verification and form submission"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

/// API document with its info block taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match (author.find('<'), author.rfind('>')) {
        (Some(start), Some(end)) if start < end => (
            optional_str(author[..start].trim()),
            optional_str(author[start + 1..end].trim()),
        ),
        _ => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
