//! One-time passcode challenges keyed by primary identifier.
//!
//! Each subject has at most one live challenge. Issuing again replaces the
//! previous code and restarts the window. A confirmed challenge gets a second,
//! longer window in which the subject may submit. Expiry is checked on read
//! and stale entries are dropped whenever a code is issued; nothing sweeps the
//! map in the background.

use rand::{rngs::OsRng, Rng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::error::OtpError;
use super::validators::{OtpCode, PrimaryId};

pub const DEFAULT_OTP_TTL_SECONDS: u64 = 5 * 60;
/// Upper bound for the configured code lifetime.
pub const MAX_OTP_TTL_SECONDS: u64 = 24 * 60 * 60;
/// How long a confirmed challenge keeps the subject verified.
pub const VERIFIED_TTL_SECONDS: u64 = 30 * 60;

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Time source for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + *offset
    }
}

/// Successful confirmation marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verified;

/// Capability the verification flow needs from an OTP backend.
pub trait OtpStore: Send + Sync {
    /// Mint a fresh code for `subject`, replacing any previous challenge.
    fn issue(&self, subject: &PrimaryId) -> OtpCode;

    /// Check `code` against the live challenge for `subject`.
    ///
    /// # Errors
    /// `NotFound` when there is no unconsumed code, `Expired` (and the challenge
    /// is dropped) once the window has passed, `Mismatch` for a wrong code.
    fn confirm(&self, subject: &PrimaryId, code: &OtpCode) -> Result<Verified, OtpError>;

    /// Whether the most recent challenge for `subject` was confirmed and is
    /// still inside its verified window.
    fn is_verified(&self, subject: &PrimaryId) -> bool;

    /// Atomically take the verification for `subject`. Returns `false` when
    /// there is none, so at most one caller wins per confirmed challenge.
    fn consume_verified(&self, subject: &PrimaryId) -> bool;

    /// Give back a verification taken by `consume_verified`. A challenge issued
    /// in the meantime wins and is left untouched.
    fn restore_verified(&self, subject: &PrimaryId);

    /// Forget `subject` entirely.
    fn retire(&self, subject: &PrimaryId);
}

#[derive(Debug)]
struct Challenge {
    /// `None` once the code has been used.
    code: Option<OtpCode>,
    issued_at: Instant,
    expires_at: Instant,
    verified: bool,
}

/// In-process store, injected as `Arc<dyn OtpStore>`.
pub struct MemoryOtpStore {
    ttl: Duration,
    clock: Box<dyn Clock>,
    challenges: Mutex<HashMap<PrimaryId, Challenge>>,
}

impl MemoryOtpStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }

    /// `ttl` is capped at [`MAX_OTP_TTL_SECONDS`].
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: impl Clock + 'static) -> Self {
        Self {
            ttl: ttl.min(Duration::from_secs(MAX_OTP_TTL_SECONDS)),
            clock: Box::new(clock),
            challenges: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of tracked subjects, verified ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.challenges().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn verified_challenge(now: Instant) -> Challenge {
        Challenge {
            code: None,
            issued_at: now,
            expires_at: deadline(now, Duration::from_secs(VERIFIED_TTL_SECONDS)),
            verified: true,
        }
    }

    fn challenges(&self) -> MutexGuard<'_, HashMap<PrimaryId, Challenge>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.challenges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deadlines past what `Instant` can represent expire at once.
fn deadline(now: Instant, window: Duration) -> Instant {
    now.checked_add(window).unwrap_or(now)
}

impl Default for MemoryOtpStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_OTP_TTL_SECONDS))
    }
}

impl std::fmt::Debug for MemoryOtpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOtpStore")
            .field("ttl", &self.ttl)
            .field("subjects", &self.len())
            .finish_non_exhaustive()
    }
}

impl OtpStore for MemoryOtpStore {
    fn issue(&self, subject: &PrimaryId) -> OtpCode {
        let code = OtpCode::from_number(OsRng.gen_range(CODE_MIN..=CODE_MAX));
        let now = self.clock.now();

        let mut challenges = self.challenges();
        challenges.retain(|_, challenge| now <= challenge.expires_at);
        challenges.insert(
            subject.clone(),
            Challenge {
                code: Some(code.clone()),
                issued_at: now,
                expires_at: deadline(now, self.ttl),
                verified: false,
            },
        );

        debug!(subjects = challenges.len(), "otp challenge issued");
        code
    }

    fn confirm(&self, subject: &PrimaryId, code: &OtpCode) -> Result<Verified, OtpError> {
        let now = self.clock.now();
        let mut challenges = self.challenges();

        let Some(challenge) = challenges.get_mut(subject) else {
            return Err(OtpError::NotFound);
        };

        let Some(expected) = challenge.code.as_ref() else {
            return Err(OtpError::NotFound);
        };

        if now > challenge.expires_at {
            challenges.remove(subject);
            return Err(OtpError::Expired);
        }

        if expected != code {
            return Err(OtpError::Mismatch);
        }

        debug!(
            elapsed_ms = now.duration_since(challenge.issued_at).as_millis(),
            "otp challenge verified"
        );
        *challenge = Self::verified_challenge(now);
        Ok(Verified)
    }

    fn is_verified(&self, subject: &PrimaryId) -> bool {
        let now = self.clock.now();
        self.challenges()
            .get(subject)
            .is_some_and(|challenge| challenge.verified && now <= challenge.expires_at)
    }

    fn consume_verified(&self, subject: &PrimaryId) -> bool {
        let now = self.clock.now();
        let mut challenges = self.challenges();

        if !challenges.get(subject).is_some_and(|challenge| challenge.verified) {
            return false;
        }
        challenges
            .remove(subject)
            .is_some_and(|challenge| now <= challenge.expires_at)
    }

    fn restore_verified(&self, subject: &PrimaryId) {
        let now = self.clock.now();
        self.challenges()
            .entry(subject.clone())
            .or_insert_with(|| Self::verified_challenge(now));
    }

    fn retire(&self, subject: &PrimaryId) {
        self.challenges().remove(subject);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const TTL: Duration = Duration::from_secs(DEFAULT_OTP_TTL_SECONDS);

    fn store() -> (MemoryOtpStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (MemoryOtpStore::with_clock(TTL, clock.clone()), clock)
    }

    fn subject() -> Result<PrimaryId> {
        Ok(PrimaryId::parse("123456789012")?)
    }

    #[test]
    fn issued_codes_are_six_digits_without_leading_zero() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        for _ in 0..200 {
            let code = store.issue(&subject);
            let value: u32 = code.expose().parse()?;
            assert_eq!(code.expose().len(), 6);
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn confirm_without_issue_is_not_found() -> Result<()> {
        let (store, _) = store();
        let code = OtpCode::parse("123456")?;
        assert_eq!(store.confirm(&subject()?, &code), Err(OtpError::NotFound));
        Ok(())
    }

    #[test]
    fn reissue_invalidates_previous_code() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let first = store.issue(&subject);
        let mut second = store.issue(&subject);
        // Two draws can collide; keep issuing until the codes differ.
        while second == first {
            second = store.issue(&subject);
        }

        assert_eq!(store.confirm(&subject, &first), Err(OtpError::Mismatch));
        assert_eq!(store.confirm(&subject, &second), Ok(Verified));
        Ok(())
    }

    #[test]
    fn confirmed_code_cannot_be_replayed() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let code = store.issue(&subject);

        assert_eq!(store.confirm(&subject, &code), Ok(Verified));
        assert!(store.is_verified(&subject));
        assert_eq!(store.confirm(&subject, &code), Err(OtpError::NotFound));
        assert!(store.is_verified(&subject));
        Ok(())
    }

    #[test]
    fn expired_code_is_removed() -> Result<()> {
        let (store, clock) = store();
        let subject = subject()?;
        let code = store.issue(&subject);

        clock.advance(TTL + Duration::from_secs(1));

        assert_eq!(store.confirm(&subject, &code), Err(OtpError::Expired));
        assert!(store.is_empty());
        assert_eq!(store.confirm(&subject, &code), Err(OtpError::NotFound));
        Ok(())
    }

    #[test]
    fn code_is_still_valid_at_the_window_edge() -> Result<()> {
        let (store, clock) = store();
        let subject = subject()?;
        let code = store.issue(&subject);

        clock.advance(TTL);

        assert_eq!(store.confirm(&subject, &code), Ok(Verified));
        Ok(())
    }

    #[test]
    fn mismatch_keeps_challenge_alive() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let code = store.issue(&subject);
        let wrong = if code.expose() == "111111" {
            OtpCode::parse("222222")?
        } else {
            OtpCode::parse("111111")?
        };

        assert_eq!(store.confirm(&subject, &wrong), Err(OtpError::Mismatch));
        assert!(!store.is_verified(&subject));
        assert_eq!(store.confirm(&subject, &code), Ok(Verified));
        Ok(())
    }

    #[test]
    fn reissue_after_verification_resets_state() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let code = store.issue(&subject);
        store.confirm(&subject, &code)?;

        store.issue(&subject);
        assert!(!store.is_verified(&subject));
        Ok(())
    }

    #[test]
    fn issue_drops_stale_unverified_challenges() -> Result<()> {
        let (store, clock) = store();
        let stale = PrimaryId::parse("111111111111")?;
        let verified = PrimaryId::parse("222222222222")?;

        store.issue(&stale);
        let code = store.issue(&verified);
        store.confirm(&verified, &code)?;

        clock.advance(TTL * 2);
        store.issue(&subject()?);

        assert_eq!(store.len(), 2);
        assert!(store.is_verified(&verified));
        Ok(())
    }

    #[test]
    fn oversized_ttl_is_capped() -> Result<()> {
        let store = MemoryOtpStore::new(Duration::from_secs(u64::MAX));
        assert_eq!(store.ttl(), Duration::from_secs(MAX_OTP_TTL_SECONDS));

        let subject = subject()?;
        let code = store.issue(&subject);
        assert_eq!(store.confirm(&subject, &code), Ok(Verified));
        Ok(())
    }

    #[test]
    fn verification_lapses_and_is_swept() -> Result<()> {
        let (store, clock) = store();
        let subject = subject()?;
        let code = store.issue(&subject);
        store.confirm(&subject, &code)?;

        clock.advance(Duration::from_secs(VERIFIED_TTL_SECONDS));
        assert!(store.is_verified(&subject));

        clock.advance(Duration::from_secs(1));
        assert!(!store.is_verified(&subject));
        assert!(!store.consume_verified(&subject));

        let code = store.issue(&subject);
        store.confirm(&subject, &code)?;
        clock.advance(Duration::from_secs(VERIFIED_TTL_SECONDS + 1));
        store.issue(&PrimaryId::parse("222222222222")?);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[test]
    fn verification_is_consumed_once() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        assert!(!store.consume_verified(&subject));

        let code = store.issue(&subject);
        assert!(!store.consume_verified(&subject));
        assert_eq!(store.len(), 1);

        store.confirm(&subject, &code)?;
        assert!(store.consume_verified(&subject));
        assert!(!store.consume_verified(&subject));
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn restore_does_not_clobber_a_new_challenge() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let code = store.issue(&subject);
        store.confirm(&subject, &code)?;
        assert!(store.consume_verified(&subject));

        store.restore_verified(&subject);
        assert!(store.is_verified(&subject));
        assert!(store.consume_verified(&subject));

        let fresh = store.issue(&subject);
        store.restore_verified(&subject);
        assert!(!store.is_verified(&subject));
        assert_eq!(store.confirm(&subject, &fresh), Ok(Verified));
        Ok(())
    }

    #[test]
    fn retire_forgets_subject() -> Result<()> {
        let (store, _) = store();
        let subject = subject()?;
        let code = store.issue(&subject);
        store.confirm(&subject, &code)?;

        store.retire(&subject);
        assert!(!store.is_verified(&subject));
        assert!(store.is_empty());
        Ok(())
    }
}
