//! # Udyam (identity verification and registration)
//!
//! `udyam` backs a multi-step registration form. A subject proves control of a
//! 12-digit primary ID with a one-time passcode, then supplies a secondary
//! tax-style ID and the rest of the form, which is stored as one submission.
//!
//! ## Flow
//!
//! 1. `POST /api/generate-otp` validates the primary ID and issues a 6-digit
//!    code, valid for 5 minutes. Issuing again invalidates the previous code.
//! 2. `POST /api/verify-otp` confirms the code. A code can be used once.
//! 3. `POST /api/submit` validates the secondary ID (`ABCDE1234F`, upper case
//!    only) and records the payload. It is refused with `403` unless the primary
//!    ID passed step 2, and each verification allows exactly one submission.
//!
//! The rules live in [`registration`]; [`api`] maps them onto HTTP and
//! [`cli`] wires configuration, logging and the server together.

pub mod api;
pub mod cli;
pub mod registration;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with("udyam/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }
}
