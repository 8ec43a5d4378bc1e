//! Transfer records and ledger views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountNumber;

/// A completed transfer between two accounts
///
/// Records are immutable once written. `sequence` is assigned by the store
/// and strictly increases with every append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub sequence: i64,
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
}

/// Direction of a transfer relative to the account being queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

/// One line of an account's transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub transaction_id: Uuid,
    /// Counterparty username, `None` when the account no longer exists
    pub counterparty: Option<String>,
    pub counterparty_account: AccountNumber,
    pub direction: Direction,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Counterparty name for display
    pub fn counterparty_display(&self) -> &str {
        self.counterparty.as_deref().unwrap_or("(closed account)")
    }
}

/// Transfer instruction from an authenticated caller
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub destination: String,
    pub amount: i64,
    pub password: String,
}

/// Outcome of a successful transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub record: TransactionRecord,
    pub new_balance: i64,
}
