//! Format checks for the identifiers collected by the registration form.
//!
//! The same patterns are published to the form renderer through `/api/schema`,
//! so client-side and server-side validation cannot drift apart.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

use super::error::{Field, ValidationError};

/// 12 ASCII digits (Aadhaar-style national id).
pub const PRIMARY_ID_PATTERN: &str = r"^[0-9]{12}$";
/// 5 upper-case letters, 4 digits, 1 upper-case letter (PAN-style tax id).
/// Lower-case letters are rejected.
pub const SECONDARY_ID_PATTERN: &str = r"^[A-Z]{5}[0-9]{4}[A-Z]$";
/// 6 ASCII digits.
pub const OTP_CODE_PATTERN: &str = r"^[0-9]{6}$";

static PRIMARY_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(PRIMARY_ID_PATTERN).ok());
static SECONDARY_ID_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(SECONDARY_ID_PATTERN).ok());
static OTP_CODE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(OTP_CODE_PATTERN).ok());

fn matches(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// True iff `s` is exactly 12 ASCII digits.
pub fn is_valid_primary(s: &str) -> bool {
    matches(&PRIMARY_ID_RE, s)
}

/// True iff `s` matches `[A-Z]{5}[0-9]{4}[A-Z]`.
pub fn is_valid_secondary(s: &str) -> bool {
    matches(&SECONDARY_ID_RE, s)
}

/// True iff `s` is exactly 6 ASCII digits.
pub fn is_valid_otp_code(s: &str) -> bool {
    matches(&OTP_CODE_RE, s)
}

/// A primary identifier that passed [`is_valid_primary`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimaryId(String);

impl PrimaryId {
    /// Trim and validate raw input.
    ///
    /// # Errors
    /// Returns a field-level error for empty or malformed input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Missing(Field::PrimaryId));
        }
        if !is_valid_primary(value) {
            return Err(ValidationError::Malformed(Field::PrimaryId));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrimaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PrimaryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A secondary identifier that passed [`is_valid_secondary`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SecondaryId(String);

impl SecondaryId {
    /// Trim and validate raw input. Case is preserved, so lower-case input fails.
    ///
    /// # Errors
    /// Returns a field-level error for empty or malformed input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Missing(Field::SecondaryId));
        }
        if !is_valid_secondary(value) {
            return Err(ValidationError::Malformed(Field::SecondaryId));
        }
        Ok(Self(value.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecondaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SecondaryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A six digit one-time passcode. `Debug` never prints the digits.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// # Errors
    /// Returns a field-level error for empty or malformed input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Missing(Field::OtpCode));
        }
        if !is_valid_otp_code(value) {
            return Err(ValidationError::Malformed(Field::OtpCode));
        }
        Ok(Self(value.to_string()))
    }

    /// Codes minted by the store are always in range, so no validation here.
    pub(crate) fn from_number(value: u32) -> Self {
        Self(format!("{value:06}"))
    }

    /// Expose the digits, for the delivery channel only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_accepts_twelve_digits_only() {
        assert!(is_valid_primary("123456789012"));
        assert!(is_valid_primary("000000000000"));

        for bad in [
            "",
            "123",
            "12345678901",
            "1234567890123",
            "12345678901a",
            " 23456789012",
            "１２３４５６７８９０１２",
            "123456789012\n",
        ] {
            assert!(!is_valid_primary(bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn secondary_is_upper_case_only() {
        assert!(is_valid_secondary("ABCDE1234F"));
        assert!(is_valid_secondary("ZZZZZ0000A"));

        for bad in [
            "abcde1234f",
            "ABCDe1234F",
            "ABCDE1234f",
            "ABCD1234EF",
            "ABCDE12345",
            "ABCDE1234",
            "ABCDE1234FG",
            "12345ABCDE",
            "",
        ] {
            assert!(!is_valid_secondary(bad), "accepted {bad:?}");
        }
    }

    #[test]
    fn otp_code_is_six_digits() {
        assert!(is_valid_otp_code("123456"));
        assert!(is_valid_otp_code("000001"));
        assert!(!is_valid_otp_code("12345"));
        assert!(!is_valid_otp_code("1234567"));
        assert!(!is_valid_otp_code("12a456"));
    }

    #[test]
    fn parse_trims_and_reports_field() {
        assert_eq!(
            PrimaryId::parse(" 123456789012 ").map(|id| id.as_str().to_string()),
            Ok("123456789012".to_string())
        );
        assert_eq!(
            PrimaryId::parse("   "),
            Err(ValidationError::Missing(Field::PrimaryId))
        );
        assert_eq!(
            SecondaryId::parse("abcde1234f"),
            Err(ValidationError::Malformed(Field::SecondaryId))
        );
        assert_eq!(
            OtpCode::parse("12"),
            Err(ValidationError::Malformed(Field::OtpCode))
        );
    }

    #[test]
    fn otp_code_debug_is_redacted() {
        let code = OtpCode::from_number(123_456);
        assert_eq!(code.expose(), "123456");
        assert_eq!(format!("{code:?}"), "OtpCode(***)");
    }
}
