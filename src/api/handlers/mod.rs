//! Route handlers. Registration handlers are thin: they decode the body, drive
//! one step of [`crate::registration::VerificationFlow`] and map the outcome.

pub mod health;
pub mod otp;
pub mod pincode;
pub mod root;
pub mod schema;
pub mod submit;
