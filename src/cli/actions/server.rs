use crate::api;
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::fmt::{self, Write as _};
use tracing::info;
use url::Url;

pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub frontend_url: String,
    pub otp_ttl_seconds: u64,
    pub pincode_api_url: String,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("dsn", &redact_dsn(self.dsn.expose_secret()))
            .field("frontend_url", &self.frontend_url)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .field("pincode_api_url", &self.pincode_api_url)
            .finish()
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = api::ServerConfig::new(args.frontend_url)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_pincode_api_url(args.pincode_api_url);

    api::new(args.port, args.dsn.expose_secret(), config).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(args.dsn.expose_secret())),
        ("frontend_url", args.frontend_url.clone()),
        ("otp_ttl_seconds", args.otp_ttl_seconds.to_string()),
        ("pincode_api_url", args.pincode_api_url.clone()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} ({})\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
