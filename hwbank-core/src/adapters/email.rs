//! Email delivery adapters
//!
//! - [`HttpEmailRelay`] posts messages as JSON to an HTTPS relay endpoint
//! - [`OutboxEmailSender`] appends messages to a local `outbox.jsonl` file,
//!   used when no relay is configured

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::ports::{EmailMessage, EmailSender};

const RELAY_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

/// Sends mail through an HTTPS JSON relay
pub struct HttpEmailRelay {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from_address: String,
}

impl HttpEmailRelay {
    /// Create a relay client for `relay_url`
    pub fn new(relay_url: &str, api_key: Option<String>, from_address: impl Into<String>) -> Result<Self> {
        let parsed = Url::parse(relay_url)
            .map_err(|e| Error::Config(format!("Invalid email relay URL: {}", e)))?;

        if parsed.scheme() != "https" {
            return Err(Error::Config("Email relay URL must use HTTPS".to_string()));
        }
        if parsed.host_str().unwrap_or("").is_empty() {
            return Err(Error::Config("Email relay URL must include a host".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: parsed.to_string(),
            api_key,
            from_address: from_address.into(),
        })
    }

    fn map_request_error(error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::delivery(format!("Relay timed out after {} seconds", RELAY_TIMEOUT_SECS))
        } else if error.is_connect() {
            Error::delivery("Unable to connect to email relay")
        } else {
            Error::delivery(format!("Relay request failed: {}", error))
        }
    }
}

impl EmailSender for HttpEmailRelay {
    fn name(&self) -> &str {
        "relay"
    }

    fn send(&self, message: &EmailMessage) -> Result<()> {
        let payload = RelayPayload {
            from: &self.from_address,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: message.html.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(Self::map_request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::delivery(format!("Relay rejected message: HTTP {}", status.as_u16())));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboxLine<'a> {
    queued_at: String,
    from: &'a str,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

/// Writes messages to a local JSON-lines outbox
pub struct OutboxEmailSender {
    path: PathBuf,
    from_address: String,
    // Serializes appends from concurrent sessions
    write_lock: Mutex<()>,
}

impl OutboxEmailSender {
    pub fn new(bank_dir: &Path, from_address: impl Into<String>) -> Self {
        Self {
            path: bank_dir.join("outbox.jsonl"),
            from_address: from_address.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every queued message, oldest first
    pub fn read_all(&self) -> Result<Vec<EmailMessage>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line)?;
                Ok(EmailMessage {
                    to: value["to"].as_str().unwrap_or_default().to_string(),
                    subject: value["subject"].as_str().unwrap_or_default().to_string(),
                    text: value["text"].as_str().unwrap_or_default().to_string(),
                    html: value["html"].as_str().map(str::to_string),
                })
            })
            .collect()
    }
}

impl EmailSender for OutboxEmailSender {
    fn name(&self) -> &str {
        "outbox"
    }

    fn send(&self, message: &EmailMessage) -> Result<()> {
        let line = serde_json::to_string(&OutboxLine {
            queued_at: Utc::now().to_rfc3339(),
            from: &self.from_address,
            message,
        })?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| Error::delivery(format!("Outbox lock poisoned: {}", e)))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::delivery(format!("Cannot open outbox: {}", e)))?;
        writeln!(file, "{}", line).map_err(|e| Error::delivery(format!("Cannot write outbox: {}", e)))?;
        Ok(())
    }
}
