use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

use crate::registration::{
    otp::{DEFAULT_OTP_TTL_SECONDS, MAX_OTP_TTL_SECONDS},
    pincode::DEFAULT_PINCODE_API_URL,
};

pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_PINCODE_API_URL: &str = "pincode-api-url";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub frontend_url: String,
    pub otp_ttl_seconds: u64,
    pub pincode_api_url: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_url: matches
                .get_one::<String>(ARG_FRONTEND_URL)
                .cloned()
                .context("missing argument: --frontend-url")?,
            otp_ttl_seconds: matches
                .get_one::<u64>(ARG_OTP_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_OTP_TTL_SECONDS),
            pincode_api_url: matches
                .get_one::<String>(ARG_PINCODE_API_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_PINCODE_API_URL.to_string()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Origin allowed by CORS, `*` allows any origin")
                .env("UDYAM_FRONTEND_URL")
                .default_value("*"),
        )
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("How long an issued OTP stays valid, in seconds (at most one day)")
                .env("UDYAM_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_OTP_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_PINCODE_API_URL)
                .long(ARG_PINCODE_API_URL)
                .help("Base URL of the postal code lookup service")
                .env("UDYAM_PINCODE_API_URL")
                .default_value(DEFAULT_PINCODE_API_URL),
        )
}
