//! Configuration management
//!
//! Settings live in `settings.json` inside the bank directory:
//! ```json
//! {
//!   "bank": { "openingBalance": 20000, "otpTtlSeconds": 300, ... },
//!   "credentials": { "memoryCost": 19456, "timeCost": 2, "parallelism": 1 },
//!   "email": { "relayUrl": "https://...", "fromAddress": "..." }
//! }
//! ```
//! Secrets (the relay API key) should come from the environment rather than
//! the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::Argon2Params;

pub const DEFAULT_OPENING_BALANCE: i64 = 20000;
pub const DEFAULT_OTP_TTL_SECONDS: i64 = 300;
pub const DEFAULT_OTP_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_SESSION_IDLE_SECONDS: i64 = 1800;
pub const DEFAULT_FROM_ADDRESS: &str = "HelloWorld Bank <no-reply@helloworld.bank>";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    bank: BankSettings,
    #[serde(default)]
    credentials: Option<Argon2Params>,
    #[serde(default)]
    email: EmailSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BankSettings {
    #[serde(default)]
    opening_balance: Option<i64>,
    #[serde(default)]
    otp_ttl_seconds: Option<i64>,
    #[serde(default)]
    otp_max_attempts: Option<u32>,
    #[serde(default)]
    session_idle_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailSettings {
    #[serde(default)]
    relay_url: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    from_address: Option<String>,
}

/// Email relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    /// HTTPS endpoint of the relay; `None` writes to the local outbox
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            relay_url: None,
            api_key: None,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
        }
    }
}

/// Bank configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub opening_balance: i64,
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: u32,
    pub session_idle_seconds: i64,
    pub credentials: Argon2Params,
    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            opening_balance: DEFAULT_OPENING_BALANCE,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            session_idle_seconds: DEFAULT_SESSION_IDLE_SECONDS,
            credentials: Argon2Params::default(),
            email: EmailConfig::default(),
        }
    }
}

impl Config {
    /// Load config from the bank directory
    ///
    /// Environment overrides:
    /// - `HWBANK_OPENING_BALANCE`
    /// - `HWBANK_EMAIL_RELAY_URL`
    /// - `HWBANK_EMAIL_API_KEY`
    pub fn load(bank_dir: &Path) -> Result<Self> {
        let settings_path = bank_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file: {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);

        if let Ok(value) = std::env::var("HWBANK_OPENING_BALANCE") {
            config.opening_balance = value
                .trim()
                .parse()
                .context("HWBANK_OPENING_BALANCE must be an integer")?;
        }
        if let Ok(url) = std::env::var("HWBANK_EMAIL_RELAY_URL") {
            config.email.relay_url = Some(url);
        }
        if let Ok(key) = std::env::var("HWBANK_EMAIL_API_KEY") {
            config.email.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }

    fn from_settings(raw: SettingsFile) -> Self {
        let defaults = Self::default();
        Self {
            opening_balance: raw.bank.opening_balance.unwrap_or(defaults.opening_balance),
            otp_ttl_seconds: raw.bank.otp_ttl_seconds.unwrap_or(defaults.otp_ttl_seconds),
            otp_max_attempts: raw.bank.otp_max_attempts.unwrap_or(defaults.otp_max_attempts),
            session_idle_seconds: raw
                .bank
                .session_idle_seconds
                .unwrap_or(defaults.session_idle_seconds),
            credentials: raw.credentials.unwrap_or_default(),
            email: EmailConfig {
                relay_url: raw.email.relay_url,
                api_key: raw.email.api_key,
                from_address: raw.email.from_address.unwrap_or(defaults.email.from_address),
            },
        }
    }

    /// Reject settings the services cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.opening_balance < 0 {
            anyhow::bail!("openingBalance cannot be negative");
        }
        if self.otp_ttl_seconds <= 0 {
            anyhow::bail!("otpTtlSeconds must be positive");
        }
        if self.otp_max_attempts == 0 {
            anyhow::bail!("otpMaxAttempts must be at least 1");
        }
        if self.session_idle_seconds <= 0 {
            anyhow::bail!("sessionIdleSeconds must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.opening_balance, 20000);
        assert_eq!(config.otp_ttl_seconds, 300);
        assert_eq!(config.credentials, Argon2Params::default());
    }

    #[test]
    fn test_partial_settings_and_unknown_keys_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"bank": {"otpTtlSeconds": 60, "theme": "dark"}, "extra": {"a": 1}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.otp_ttl_seconds, 60);
        assert_eq!(config.otp_max_attempts, DEFAULT_OTP_MAX_ATTEMPTS);
        assert_eq!(config.email.from_address, DEFAULT_FROM_ADDRESS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"bank": {"otpTtlSeconds": 0}}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
