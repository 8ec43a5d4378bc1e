//! Logging service - structured event logging to DuckDB
//!
//! Stores operational events in logs.duckdb next to the bank database.
//! Events carry an operation name and an opaque reference (account number,
//! transfer id) at most. Balances, passwords, OTP codes and email addresses
//! are never logged.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::Utc;
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, ErrorKind};
use crate::migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID based on timestamp + counter
fn generate_id() -> u64 {
    // Lower 16 bits hold the counter (65536 unique IDs per millisecond)
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Entry point for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Service,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Service => "service",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            operation: None,
            reference: None,
            error_kind: None,
            error_message: None,
            error_details: None,
        }
    }

    /// Set the operation (e.g. "transfer", "register")
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set an opaque reference such as an account number or transfer id
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Attach an error
    ///
    /// The message is the user-safe one. Full detail is only kept for
    /// dependency failures, whose text never contains customer data.
    pub fn with_failure(mut self, error: &Error) -> Self {
        let kind = error.kind();
        self.error_kind = Some(kind);
        self.error_message = Some(error.public_message());
        if kind == ErrorKind::Dependency {
            self.error_details = Some(error.to_string());
        }
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub operation: Option<String>,
    pub reference: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const ENTRY_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, event,
    operation, reference, error_kind, error_message, error_details";

fn row_to_entry(row: &duckdb::Row) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        entry_point: row.get(2)?,
        app_version: row.get(3)?,
        platform: row.get(4)?,
        event: row.get(5)?,
        operation: row.get(6)?,
        reference: row.get(7)?,
        error_kind: row.get(8)?,
        error_message: row.get(9)?,
        error_details: row.get(10)?,
    })
}

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in the bank directory
    pub fn new(bank_dir: &Path, entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let db_path = bank_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn, Some(db_path), entry_point, app_version.into())
    }

    /// Log kept in memory only
    pub fn in_memory(entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, None, entry_point, app_version.into())
    }

    fn from_connection(
        conn: Connection,
        db_path: Option<PathBuf>,
        entry_point: EntryPoint,
        app_version: String,
    ) -> Result<Self> {
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version,
            platform: detect_platform(),
        })
    }

    /// Log an event
    ///
    /// The entry point, app version and platform are added from the
    /// service configuration.
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                id, timestamp, entry_point, app_version, platform,
                event, operation, reference, error_kind, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.operation,
                &event.reference,
                event.error_kind.map(|k| format!("{:?}", k)),
                &event.error_message,
                &event.error_details,
            ],
        )?;

        Ok(())
    }

    /// Log without letting a logging failure affect the caller
    pub fn record(&self, event: LogEvent) {
        if let Err(e) = self.log(event) {
            eprintln!("[hwbank] Failed to write event log: {}", e);
        }
    }

    /// Record `operation_failed` when `result` failed in a dependency
    ///
    /// Business rejections are left to the caller. Storage, delivery and
    /// other dependency failures keep their full detail here.
    pub fn record_dependency_failure<T>(&self, operation: &str, result: &std::result::Result<T, Error>) {
        if let Err(e) = result {
            if e.kind() == ErrorKind::Dependency {
                self.record(
                    LogEvent::new("operation_failed")
                        .with_operation(operation)
                        .with_failure(e),
                );
            }
        }
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!("SELECT {} FROM sys_logs ORDER BY id DESC LIMIT ?", ENTRY_COLUMNS),
            limit,
        )
    }

    /// Most recent entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM sys_logs WHERE error_message IS NOT NULL ORDER BY id DESC LIMIT ?",
                ENTRY_COLUMNS
            ),
            limit,
        )
    }

    fn query_entries(&self, sql: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare(sql)?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of entries per event name
    pub fn event_counts(&self) -> Result<BTreeMap<String, u64>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let mut stmt = conn.prepare("SELECT event, COUNT(*) FROM sys_logs GROUP BY event")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the specified timestamp (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Path of logs.duckdb, `None` for an in-memory log
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_logging_service_creation() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "1.0.0").unwrap();
        assert!(service.db_path().unwrap().exists());
    }

    #[test]
    fn test_log_event() {
        let service = LoggingService::in_memory(EntryPoint::Cli, "1.0.0").unwrap();
        service.log(LogEvent::new("login_succeeded")).unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "login_succeeded");
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "1.0.0");
    }

    #[test]
    fn test_log_with_context() {
        let service = LoggingService::in_memory(EntryPoint::Service, "2.0.0").unwrap();
        service
            .log(
                LogEvent::new("transfer_completed")
                    .with_operation("transfer")
                    .with_reference("5b0c3c1e"),
            )
            .unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries[0].operation.as_deref(), Some("transfer"));
        assert_eq!(entries[0].reference.as_deref(), Some("5b0c3c1e"));
        assert_eq!(entries[0].entry_point, "service");
    }

    #[test]
    fn test_failure_keeps_detail_only_for_dependencies() {
        let service = LoggingService::in_memory(EntryPoint::Cli, "1.0.0").unwrap();
        service
            .log(LogEvent::new("transfer_failed").with_failure(&Error::database("disk full")))
            .unwrap();
        service
            .log(LogEvent::new("transfer_rejected").with_failure(&Error::insufficient_funds(100, 500)))
            .unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 2);

        let rejected = errors.iter().find(|e| e.event == "transfer_rejected").unwrap();
        assert_eq!(rejected.error_message.as_deref(), Some("Insufficient funds"));
        assert!(rejected.error_details.is_none());

        let failed = errors.iter().find(|e| e.event == "transfer_failed").unwrap();
        assert!(failed.error_details.as_deref().unwrap().contains("disk full"));
        assert_eq!(failed.error_kind.as_deref(), Some("Dependency"));
    }

    #[test]
    fn test_record_dependency_failure_skips_rejections() {
        let service = LoggingService::in_memory(EntryPoint::Cli, "1.0.0").unwrap();
        let ok: std::result::Result<(), Error> = Ok(());
        service.record_dependency_failure("balance", &ok);
        service.record_dependency_failure::<()>("login", &Err(Error::not_found("User not found")));
        assert_eq!(service.count().unwrap(), 0);

        service.record_dependency_failure::<()>("history", &Err(Error::database("catalog gone")));
        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, "operation_failed");
        assert_eq!(errors[0].operation.as_deref(), Some("history"));
        assert!(errors[0].error_details.as_deref().unwrap().contains("catalog gone"));
    }

    #[test]
    fn test_count_stats_and_delete() {
        let service = LoggingService::in_memory(EntryPoint::Cli, "1.0.0").unwrap();
        service.log(LogEvent::new("otp_issued")).unwrap();
        service.log(LogEvent::new("otp_issued")).unwrap();
        service
            .log(LogEvent::new("otp_delivery_failed").with_failure(&Error::delivery("relay down")))
            .unwrap();

        assert_eq!(service.count().unwrap(), 3);
        let counts = service.event_counts().unwrap();
        assert_eq!(counts.get("otp_issued"), Some(&2));

        let deleted = service.delete_before(now_ms() + 1000).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(service.count().unwrap(), 0);
    }
}
