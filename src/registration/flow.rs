//! Three-step verification flow.
//!
//! ```text
//! AwaitingPrimary --submit_primary--> AwaitingOtp --submit_otp--> AwaitingSecondary
//!        ^                                                              |
//!        +------------------reset------------- Complete <--submit_secondary
//! ```
//!
//! Every step validates its input, consults the injected collaborators and
//! either advances exactly one state or fails without moving. The submission
//! sink is only reachable from `AwaitingSecondary`, which in turn is only
//! reachable through a confirmed OTP.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::delivery::OtpSender;
use super::error::{FlowError, StorageError};
use super::otp::OtpStore;
use super::payload::Payload;
use super::sink::{SubmissionId, SubmissionSink};
use super::validators::{OtpCode, PrimaryId, SecondaryId};

pub const OTP_SENT: &str = "OTP sent successfully";
pub const OTP_VERIFIED: &str = "OTP verified successfully";
pub const SUBMITTED: &str = "Form submitted successfully";
pub const RESET: &str = "Ready for a new registration";

/// External services the flow drives.
#[derive(Clone)]
pub struct Collaborators {
    pub otp_store: Arc<dyn OtpStore>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub sink: Arc<dyn SubmissionSink>,
}

impl Collaborators {
    pub fn new(
        otp_store: Arc<dyn OtpStore>,
        otp_sender: Arc<dyn OtpSender>,
        sink: Arc<dyn SubmissionSink>,
    ) -> Self {
        Self {
            otp_store,
            otp_sender,
            sink,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKind {
    AwaitingPrimary,
    AwaitingOtp,
    AwaitingSecondary,
    Complete,
}

impl StateKind {
    /// Form step number shown by the renderer (1-4).
    #[must_use]
    pub const fn step(self) -> u8 {
        match self {
            Self::AwaitingPrimary => 1,
            Self::AwaitingOtp => 2,
            Self::AwaitingSecondary => 3,
            Self::Complete => 4,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingPrimary => "awaiting primary ID",
            Self::AwaitingOtp => "awaiting OTP",
            Self::AwaitingSecondary => "awaiting secondary ID",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlowState {
    AwaitingPrimary,
    AwaitingOtp {
        primary_id: PrimaryId,
    },
    AwaitingSecondary {
        primary_id: PrimaryId,
    },
    Complete {
        primary_id: PrimaryId,
        secondary_id: SecondaryId,
        record_id: SubmissionId,
    },
}

impl FlowState {
    #[must_use]
    pub const fn kind(&self) -> StateKind {
        match self {
            Self::AwaitingPrimary => StateKind::AwaitingPrimary,
            Self::AwaitingOtp { .. } => StateKind::AwaitingOtp,
            Self::AwaitingSecondary { .. } => StateKind::AwaitingSecondary,
            Self::Complete { .. } => StateKind::Complete,
        }
    }
}

/// Result of a successful transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub state: StateKind,
    pub message: &'static str,
    pub record_id: Option<SubmissionId>,
}

impl Step {
    const fn to(state: StateKind, message: &'static str) -> Self {
        Self {
            state,
            message,
            record_id: None,
        }
    }
}

#[derive(Debug)]
pub struct VerificationFlow {
    collaborators: Collaborators,
    state: FlowState,
}

impl VerificationFlow {
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            state: FlowState::AwaitingPrimary,
        }
    }

    /// Re-enter the flow at the OTP step for a subject whose challenge was
    /// issued by an earlier request. Confirmation still needs a live code.
    ///
    /// # Errors
    /// Fails if `primary_id` is missing or malformed.
    pub fn resume_awaiting_otp(
        collaborators: Collaborators,
        primary_id: &str,
    ) -> Result<Self, FlowError> {
        let primary_id = PrimaryId::parse(primary_id)?;
        Ok(Self {
            collaborators,
            state: FlowState::AwaitingOtp { primary_id },
        })
    }

    /// Re-enter the flow at the final step. Only subjects whose latest OTP
    /// challenge was confirmed are let through.
    ///
    /// # Errors
    /// Fails on a malformed id, or with `NotVerified` when the store holds no
    /// confirmed challenge for it.
    pub fn resume_verified(
        collaborators: Collaborators,
        primary_id: &str,
    ) -> Result<Self, FlowError> {
        let primary_id = PrimaryId::parse(primary_id)?;
        if !collaborators.otp_store.is_verified(&primary_id) {
            return Err(FlowError::NotVerified);
        }
        Ok(Self {
            collaborators,
            state: FlowState::AwaitingSecondary { primary_id },
        })
    }

    #[must_use]
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    fn out_of_order(&self, expected: StateKind) -> FlowError {
        FlowError::OutOfOrder {
            expected,
            actual: self.state.kind(),
        }
    }

    /// Validate the primary id, issue a challenge and deliver the code.
    ///
    /// # Errors
    /// Validation failure, out-of-order call, or delivery failure. The state is
    /// unchanged on error.
    pub fn submit_primary(&mut self, raw: &str) -> Result<Step, FlowError> {
        if self.state != FlowState::AwaitingPrimary {
            return Err(self.out_of_order(StateKind::AwaitingPrimary));
        }

        let primary_id = PrimaryId::parse(raw)?;
        let code = self.collaborators.otp_store.issue(&primary_id);

        if let Err(err) = self.collaborators.otp_sender.deliver(&primary_id, &code) {
            error!("Failed to deliver OTP: {err:#}");
            return Err(StorageError::new(err).into());
        }

        info!(subject = %primary_id, "OTP issued");
        self.state = FlowState::AwaitingOtp { primary_id };
        Ok(Step::to(StateKind::AwaitingOtp, OTP_SENT))
    }

    /// Confirm the code for the subject captured in the previous step.
    ///
    /// # Errors
    /// Validation failure, out-of-order call, or the store's reason
    /// (not found, expired, mismatch). The state is unchanged on error.
    pub fn submit_otp(&mut self, raw: &str) -> Result<Step, FlowError> {
        let FlowState::AwaitingOtp { primary_id } = &self.state else {
            return Err(self.out_of_order(StateKind::AwaitingOtp));
        };

        let code = OtpCode::parse(raw)?;
        if let Err(err) = self.collaborators.otp_store.confirm(primary_id, &code) {
            debug!(subject = %primary_id, reason = %err, "OTP rejected");
            return Err(err.into());
        }

        info!(subject = %primary_id, "OTP verified");
        self.state = FlowState::AwaitingSecondary {
            primary_id: primary_id.clone(),
        };
        Ok(Step::to(StateKind::AwaitingSecondary, OTP_VERIFIED))
    }

    /// Validate the secondary id and record the submission.
    ///
    /// The subject's verification is consumed before the sink is called, so
    /// concurrent submissions for one confirmed OTP produce a single record.
    /// A failed write hands the verification back for a retry.
    ///
    /// # Errors
    /// Validation failure, out-of-order call, `NotVerified` when the
    /// verification was already used or has lapsed, or a storage failure
    /// (reported generically, cause logged). The state is unchanged on error.
    pub async fn submit_secondary(
        &mut self,
        raw: &str,
        payload: Payload,
    ) -> Result<Step, FlowError> {
        let FlowState::AwaitingSecondary { primary_id } = &self.state else {
            return Err(self.out_of_order(StateKind::AwaitingSecondary));
        };

        let secondary_id = SecondaryId::parse(raw)?;
        if !self.collaborators.otp_store.consume_verified(primary_id) {
            debug!(subject = %primary_id, "verification already used or lapsed");
            return Err(FlowError::NotVerified);
        }

        let record_id = match self
            .collaborators
            .sink
            .record(primary_id, &secondary_id, &payload)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!("Failed to record submission: {}", err.cause());
                self.collaborators.otp_store.restore_verified(primary_id);
                return Err(err.into());
            }
        };

        let primary_id = primary_id.clone();

        info!(subject = %primary_id, record_id = %record_id, "Submission recorded");
        self.state = FlowState::Complete {
            primary_id,
            secondary_id,
            record_id,
        };
        Ok(Step {
            state: StateKind::Complete,
            message: SUBMITTED,
            record_id: Some(record_id),
        })
    }

    /// Start over after a completed registration. OTP store entries are keyed
    /// by subject and are left alone.
    ///
    /// # Errors
    /// Out-of-order call when the flow is not complete.
    pub fn reset(&mut self) -> Result<Step, FlowError> {
        if self.state.kind() != StateKind::Complete {
            return Err(self.out_of_order(StateKind::Complete));
        }
        self.state = FlowState::AwaitingPrimary;
        Ok(Step::to(StateKind::AwaitingPrimary, RESET))
    }
}
