//! Email delivery port

use serde::Serialize;

use crate::domain::result::Result;

/// An outbound email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Outbound email delivery
///
/// Delivery is best effort: one attempt, no retry. An `Err` means the
/// message was not accepted.
pub trait EmailSender: Send + Sync {
    /// Sender name (e.g., "relay", "outbox")
    fn name(&self) -> &str;

    fn send(&self, message: &EmailMessage) -> Result<()>;
}
