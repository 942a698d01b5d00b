//! Registration domain: identifier validation, OTP challenges, the step-by-step
//! verification flow and where completed submissions end up.

pub mod delivery;
pub mod error;
pub mod flow;
pub mod otp;
pub mod payload;
pub mod pincode;
pub mod sink;
pub mod validators;

pub use delivery::{LogOtpSender, OtpSender};
pub use error::{Field, FlowError, OtpError, StorageError, ValidationError};
pub use flow::{Collaborators, FlowState, StateKind, Step, VerificationFlow};
pub use otp::{Clock, ManualClock, MemoryOtpStore, OtpStore, SystemClock, Verified};
pub use payload::{Payload, PayloadValue, Scalar};
pub use pincode::{Locality, PincodeClient};
pub use sink::{MemorySubmissionSink, PgSubmissionSink, SubmissionId, SubmissionRecord, SubmissionSink};
pub use validators::{OtpCode, PrimaryId, SecondaryId};
