//! One-time passcode challenge and its per-session state machine
//!
//! A session moves `NoChallenge -> Issued -> {Verified | Expired | Incorrect}`.
//! Expiry is evaluated lazily when a code is submitted. A successful
//! verification leaves a [`ResetGrant`] behind that authorizes exactly one
//! password reset for the bound email.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use super::result::OtpError;
use super::session::{ResetGrant, Session};

/// Lowest and highest 6-digit code
const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// A live OTP challenge bound to one email address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Result of submitting a code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OtpVerification {
    Verified { email: String },
    Expired,
    Incorrect { remaining_attempts: u32 },
    NoActiveChallenge,
    AttemptsExhausted,
}

impl OtpVerification {
    /// Convert a non-verified outcome into an error, yielding the bound email otherwise
    pub fn into_result(self) -> Result<String, OtpError> {
        match self {
            OtpVerification::Verified { email } => Ok(email),
            OtpVerification::Expired => Err(OtpError::Expired),
            OtpVerification::Incorrect { .. } => Err(OtpError::Incorrect),
            OtpVerification::NoActiveChallenge => Err(OtpError::NoActiveChallenge),
            OtpVerification::AttemptsExhausted => Err(OtpError::AttemptsExhausted),
        }
    }
}

/// Whether a password reset may proceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAuthorization {
    Authorized,
    Unauthorized,
}

/// OTP lifetime and retry policy
#[derive(Debug, Clone, Copy)]
pub struct OtpEngine {
    ttl: Duration,
    max_attempts: u32,
}

impl OtpEngine {
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        Self {
            ttl,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Install a fresh challenge, superseding any previous one
    ///
    /// Any reset grant left from an earlier verification is dropped as well.
    pub fn issue<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        email: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> OtpChallenge {
        let challenge = OtpChallenge {
            code: rng.gen_range(CODE_MIN..=CODE_MAX).to_string(),
            email: email.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
            failed_attempts: 0,
        };
        session.otp = Some(challenge.clone());
        session.reset_grant = None;
        challenge
    }

    /// Discard `challenge` after a failed delivery
    ///
    /// A newer challenge issued in the meantime is left alone.
    pub fn rollback(&self, session: &mut Session, challenge: &OtpChallenge) {
        if session.otp.as_ref() == Some(challenge) {
            session.otp = None;
        }
    }

    pub fn verify(&self, session: &mut Session, submitted: &str, now: DateTime<Utc>) -> OtpVerification {
        let Some(challenge) = session.otp.as_mut() else {
            return OtpVerification::NoActiveChallenge;
        };

        if challenge.is_expired(now) {
            session.otp = None;
            return OtpVerification::Expired;
        }

        if submitted.trim() != challenge.code {
            challenge.failed_attempts += 1;
            if challenge.failed_attempts >= self.max_attempts {
                session.otp = None;
                return OtpVerification::AttemptsExhausted;
            }
            return OtpVerification::Incorrect {
                remaining_attempts: self.max_attempts - challenge.failed_attempts,
            };
        }

        let email = challenge.email.clone();
        session.otp = None;
        session.reset_grant = Some(ResetGrant {
            email: email.clone(),
            granted_at: now,
        });
        OtpVerification::Verified { email }
    }

    /// Spend the session's reset grant on the account owning `email`
    pub fn consume_for_reset(&self, session: &mut Session, email: &str) -> ResetAuthorization {
        match &session.reset_grant {
            Some(grant) if grant.email.eq_ignore_ascii_case(email.trim()) => {
                session.reset_grant = None;
                ResetAuthorization::Authorized
            }
            _ => ResetAuthorization::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionId;

    fn setup() -> (OtpEngine, Session, DateTime<Utc>) {
        let now = Utc::now();
        (
            OtpEngine::new(Duration::seconds(300), 3),
            Session::new(SessionId::generate(), now),
            now,
        )
    }

    #[test]
    fn test_issue_generates_six_digit_code() {
        let (engine, mut session, now) = setup();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let challenge = engine.issue(&mut session, "a@example.com", &mut rng, now);
            assert_eq!(challenge.code.len(), 6);
            let value: u32 = challenge.code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
            assert_eq!(challenge.expires_at, now + Duration::seconds(300));
        }
    }

    #[test]
    fn test_verify_without_challenge() {
        let (engine, mut session, now) = setup();
        assert_eq!(
            engine.verify(&mut session, "123456", now),
            OtpVerification::NoActiveChallenge
        );
    }

    #[test]
    fn test_incorrect_code_keeps_challenge() {
        let (engine, mut session, now) = setup();
        let challenge = engine.issue(&mut session, "a@example.com", &mut rand::thread_rng(), now);
        let wrong = if challenge.code == "111111" { "222222" } else { "111111" };

        assert_eq!(
            engine.verify(&mut session, wrong, now),
            OtpVerification::Incorrect { remaining_attempts: 2 }
        );
        assert!(session.otp.is_some());

        assert_eq!(
            engine.verify(&mut session, &challenge.code, now),
            OtpVerification::Verified { email: "a@example.com".to_string() }
        );
        assert!(session.otp.is_none());
        assert!(session.reset_grant.is_some());
    }

    #[test]
    fn test_expired_code_is_discarded_even_if_correct() {
        let (engine, mut session, now) = setup();
        let challenge = engine.issue(&mut session, "a@example.com", &mut rand::thread_rng(), now);
        let later = now + Duration::seconds(301);

        assert_eq!(engine.verify(&mut session, &challenge.code, later), OtpVerification::Expired);
        assert_eq!(
            engine.verify(&mut session, &challenge.code, later),
            OtpVerification::NoActiveChallenge
        );
    }

    #[test]
    fn test_attempts_exhausted() {
        let (engine, mut session, now) = setup();
        let challenge = engine.issue(&mut session, "a@example.com", &mut rand::thread_rng(), now);
        let wrong = if challenge.code == "111111" { "222222" } else { "111111" };

        engine.verify(&mut session, wrong, now);
        engine.verify(&mut session, wrong, now);
        assert_eq!(engine.verify(&mut session, wrong, now), OtpVerification::AttemptsExhausted);
        assert_eq!(
            engine.verify(&mut session, &challenge.code, now),
            OtpVerification::NoActiveChallenge
        );
    }

    #[test]
    fn test_reissue_supersedes_and_rollback_respects_newer() {
        let (engine, mut session, now) = setup();
        let mut rng = rand::thread_rng();
        let first = engine.issue(&mut session, "a@example.com", &mut rng, now);
        let second = engine.issue(&mut session, "a@example.com", &mut rng, now + Duration::seconds(1));

        engine.rollback(&mut session, &first);
        assert_eq!(session.otp.as_ref(), Some(&second));

        engine.rollback(&mut session, &second);
        assert!(session.otp.is_none());
    }

    #[test]
    fn test_reset_grant_is_single_use_and_email_bound() {
        let (engine, mut session, now) = setup();
        let challenge = engine.issue(&mut session, "a@example.com", &mut rand::thread_rng(), now);
        engine.verify(&mut session, &challenge.code, now);

        assert_eq!(
            engine.consume_for_reset(&mut session, "b@example.com"),
            ResetAuthorization::Unauthorized
        );
        assert_eq!(
            engine.consume_for_reset(&mut session, "A@Example.com"),
            ResetAuthorization::Authorized
        );
        assert_eq!(
            engine.consume_for_reset(&mut session, "a@example.com"),
            ResetAuthorization::Unauthorized
        );
    }
}
