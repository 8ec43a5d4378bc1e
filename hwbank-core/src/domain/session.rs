//! Session state and the authenticated principal

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::account::{Account, AccountNumber};
use super::otp::OtpChallenge;

/// Opaque session token (128 random bits, hex encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authenticated identity attached to a session
///
/// Only an identity reference is kept; balances and credentials are always
/// re-read from the account store when needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub account_number: AccountNumber,
    pub username: String,
    pub authenticated_at: DateTime<Utc>,
}

impl Principal {
    pub fn for_account(account: &Account, now: DateTime<Utc>) -> Self {
        Self {
            account_number: account.account_number.clone(),
            username: account.username.clone(),
            authenticated_at: now,
        }
    }
}

/// Proof of email ownership, good for exactly one password reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetGrant {
    pub email: String,
    pub granted_at: DateTime<Utc>,
}

/// Per-session state
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub principal: Option<Principal>,
    pub otp: Option<OtpChallenge>,
    pub reset_grant: Option<ResetGrant>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            principal: None,
            otp: None,
            reset_grant: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Whether the session has been idle for longer than `idle_timeout`
    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        now - self.last_seen_at > idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique_hex() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_idle_detection() {
        let now = Utc::now();
        let session = Session::new(SessionId::generate(), now);
        assert!(!session.is_idle(now + Duration::seconds(60), Duration::seconds(1800)));
        assert!(session.is_idle(now + Duration::seconds(1801), Duration::seconds(1800)));
    }
}
