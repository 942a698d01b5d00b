//! Delivery channel for freshly issued passcodes.
//!
//! The code leaves the service only through an `OtpSender`. The default sender
//! writes it to the log, which is how the demo portal "delivers" codes; an
//! SMS or email gateway would be another implementation of the same trait.

use anyhow::Result;
use tracing::info;

use super::validators::{OtpCode, PrimaryId};

pub trait OtpSender: Send + Sync {
    /// Hand the code to the subject, or fail so the caller can report it.
    ///
    /// # Errors
    /// Returns an error when the channel rejects the message.
    fn deliver(&self, subject: &PrimaryId, code: &OtpCode) -> Result<()>;
}

/// Local dev sender that logs the code instead of sending it.
#[derive(Clone, Debug)]
pub struct LogOtpSender;

impl OtpSender for LogOtpSender {
    fn deliver(&self, subject: &PrimaryId, code: &OtpCode) -> Result<()> {
        info!(
            subject = %subject,
            otp = %code.expose(),
            "otp delivery stub"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sender_accepts_every_code() -> Result<()> {
        let subject = PrimaryId::parse("123456789012")?;
        let code = OtpCode::parse("654321")?;
        LogOtpSender.deliver(&subject, &code)
    }
}
