//! Account domain model

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::result::Error;

/// Lowest and highest 10-digit account numbers
const ACCOUNT_NUMBER_MIN: u64 = 1_000_000_000;
const ACCOUNT_NUMBER_MAX: u64 = 9_999_999_999;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("valid regex"))
}

/// A 10-digit account number, assigned once at registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Draw a uniformly random candidate number
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(ACCOUNT_NUMBER_MIN..=ACCOUNT_NUMBER_MAX).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a number read back from the store, which only holds validated numbers
    pub(crate) fn from_stored(number: String) -> Self {
        Self(number)
    }
}

impl FromStr for AccountNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let valid = trimmed.len() == 10
            && trimmed.bytes().all(|b| b.is_ascii_digit())
            && !trimmed.starts_with('0');
        if !valid {
            return Err(Error::validation("account number must be 10 digits"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Informational profile fields captured at registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub full_name: String,
    /// National identity number (Aadhaar in the original deployment)
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub date_of_birth: String,
    pub gender: String,
}

/// A customer account
///
/// `balance` is in minor currency units and never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_number: AccountNumber,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub balance: i64,
    pub profile: AccountProfile,
    pub terms_accepted: bool,
    pub created_at: DateTime<Utc>,
}

/// Registration input as received from a client
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub profile: AccountProfile,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub terms_accepted: bool,
}

impl RegistrationRequest {
    /// Validate the request before any storage access
    pub fn validate(&self) -> Result<(), Error> {
        if self.password != self.confirm_password {
            return Err(Error::validation("Passwords do not match"));
        }
        if self.password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }
        if !username_pattern().is_match(self.username.trim()) {
            return Err(Error::validation(
                "username must be 3-32 characters of letters, digits, '_', '.' or '-'",
            ));
        }
        if !email_pattern().is_match(self.profile.email.trim()) {
            return Err(Error::validation("email address is not valid"));
        }
        if !self.terms_accepted {
            return Err(Error::validation("terms and conditions must be accepted"));
        }
        Ok(())
    }
}

/// Account data ready to be persisted; the store assigns the number
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub opening_balance: i64,
    pub profile: AccountProfile,
    pub terms_accepted: bool,
}

/// Normalize an email address for lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
