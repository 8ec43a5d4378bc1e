//! DuckDB account store and transfer ledger

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, OptionalExt};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    normalize_email, Account, AccountNumber, AccountProfile, Direction, HistoryEntry, NewAccount,
    TransactionRecord,
};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

const ACCOUNT_COLUMNS: &str = "account_number, username, password_hash, balance, full_name,
    national_id, phone, email, date_of_birth, gender, terms_accepted, created_at";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// DuckDB-backed account store and ledger
///
/// All statements go through a single connection guarded by a mutex.
/// Multi-statement operations (registration, transfers) additionally run
/// inside a DuckDB transaction so they commit or roll back as a unit.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff while another process holds the
    /// file lock.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[hwbank] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(last_error
            .map(Error::from)
            .unwrap_or_else(|| Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))))
    }

    /// In-memory database, mainly for tests and embedding
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Path of the database file, `None` when in memory
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    // === Account operations ===

    /// Insert a new account with a freshly drawn account number
    ///
    /// Candidates come from `next_number` and are re-drawn until one is
    /// unused. The username check, number search and insert happen in one
    /// transaction under the connection lock.
    pub fn create_account(
        &self,
        new_account: &NewAccount,
        next_number: &mut dyn FnMut() -> AccountNumber,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let username_taken: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM sys_accounts WHERE username = ?",
            [&new_account.username],
            |row| row.get(0),
        )?;
        if username_taken {
            return Err(Error::conflict("Username already exists"));
        }

        let account_number = loop {
            let candidate = next_number();
            let exists: bool = tx.query_row(
                "SELECT COUNT(*) > 0 FROM sys_accounts WHERE account_number = ?",
                [candidate.as_str()],
                |row| row.get(0),
            )?;
            if !exists {
                break candidate;
            }
        };

        let profile = &new_account.profile;
        let email = normalize_email(&profile.email);
        tx.execute(
            "INSERT INTO sys_accounts (account_number, username, password_hash, balance, full_name,
                                       national_id, phone, email, date_of_birth, gender,
                                       terms_accepted, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                account_number.as_str(),
                new_account.username,
                new_account.password_hash,
                new_account.opening_balance,
                profile.full_name,
                profile.national_id,
                profile.phone,
                email,
                profile.date_of_birth,
                profile.gender,
                new_account.terms_accepted,
                now.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(Account {
            account_number,
            username: new_account.username.clone(),
            password_hash: new_account.password_hash.clone(),
            balance: new_account.opening_balance,
            profile: AccountProfile {
                email,
                ..profile.clone()
            },
            terms_accepted: new_account.terms_accepted,
            created_at: now,
        })
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {} FROM sys_accounts WHERE username = ?", ACCOUNT_COLUMNS),
                [username.trim()],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn find_by_account_number(&self, account_number: &AccountNumber) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("SELECT {} FROM sys_accounts WHERE account_number = ?", ACCOUNT_COLUMNS),
                [account_number.as_str()],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    /// Look up an account by email; with duplicates the oldest account wins
    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM sys_accounts WHERE email = ? ORDER BY created_at, account_number LIMIT 1",
                    ACCOUNT_COLUMNS
                ),
                [normalize_email(email)],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn get_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sys_accounts ORDER BY created_at, account_number",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map([], row_to_account)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    /// Atomically apply `delta` to an account balance and return the new balance
    ///
    /// Negative deltas are conditional: they fail with `InsufficientFunds`
    /// instead of taking the balance below zero.
    pub fn adjust_balance(&self, account_number: &AccountNumber, delta: i64) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if delta < 0 {
            debit_if_sufficient(&tx, account_number, delta.checked_neg().ok_or_else(|| {
                Error::validation("amount out of range")
            })?)?;
        } else {
            credit(&tx, account_number, delta)?;
        }
        let balance = read_balance(&tx, account_number)?;
        tx.commit()?;
        Ok(balance)
    }

    /// Replace the password hash of the account owning `email`
    pub fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sys_accounts SET password_hash = ?
             WHERE account_number = (
                 SELECT account_number FROM sys_accounts WHERE email = ?
                 ORDER BY created_at, account_number LIMIT 1
             )",
            params![password_hash, normalize_email(email)],
        )?;
        if updated == 0 {
            return Err(Error::not_found("No account with that email address"));
        }
        Ok(())
    }

    /// Remove an account record; ledger rows referencing it are kept
    pub fn delete_account(&self, account_number: &AccountNumber) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM sys_accounts WHERE account_number = ?",
            [account_number.as_str()],
        )?;
        if deleted == 0 {
            return Err(Error::not_found(format!("Account {}", account_number)));
        }
        Ok(())
    }

    // === Transfer operations ===

    /// Move `amount` from one account to another and record it
    ///
    /// Conditional debit, credit and ledger insert share one transaction:
    /// any failure rolls back all three. Returns the record and the
    /// source account's new balance.
    pub fn execute_transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(TransactionRecord, i64)> {
        if amount <= 0 {
            return Err(Error::validation("Amount must be greater than zero"));
        }
        if from == to {
            return Err(Error::validation("Cannot transfer to the same account"));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        debit_if_sufficient(&tx, from, amount)?;
        credit(&tx, to, amount)?;
        let record = insert_transfer(&tx, from, to, amount, now)?;
        let new_balance = read_balance(&tx, from)?;

        tx.commit()?;
        Ok((record, new_balance))
    }

    /// Append a ledger record without touching balances
    pub fn append_transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let conn = self.conn()?;
        insert_transfer(&conn, from, to, amount, now)
    }

    /// Ledger records touching an account, newest first, with counterparties resolved
    pub fn history_for_account(&self, account_number: &AccountNumber) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.transfer_id, t.from_account, t.to_account, t.amount, t.created_at,
                    fa.username AS from_username, ta.username AS to_username
             FROM sys_transfers t
             LEFT JOIN sys_accounts fa ON fa.account_number = t.from_account
             LEFT JOIN sys_accounts ta ON ta.account_number = t.to_account
             WHERE t.from_account = ? OR t.to_account = ?
             ORDER BY t.seq_no DESC",
        )?;

        let rows = stmt.query_map(
            params![account_number.as_str(), account_number.as_str()],
            |row| {
                Ok((
                    parse_uuid(0, &row.get::<_, String>(0)?)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    parse_timestamp(4, &row.get::<_, String>(4)?)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, from, to, amount, created_at, from_username, to_username) = row?;
            let (direction, counterparty, counterparty_account) = if from == account_number.as_str() {
                (Direction::Sent, to_username, to)
            } else {
                (Direction::Received, from_username, from)
            };
            entries.push(HistoryEntry {
                transaction_id: id,
                counterparty,
                counterparty_account: AccountNumber::from_stored(counterparty_account),
                direction,
                amount,
                timestamp: created_at,
            });
        }
        Ok(entries)
    }

    // === Reporting ===

    pub fn get_account_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sys_accounts", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_transfer_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM sys_transfers", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Sum of all balances; constant under transfers
    pub fn get_total_balance(&self) -> Result<i64> {
        let conn = self.conn()?;
        let total = conn.query_row(
            "SELECT CAST(COALESCE(SUM(balance), 0) AS BIGINT) FROM sys_accounts",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// Accounts whose balance is negative
    pub fn check_negative_balances(&self) -> Result<Vec<String>> {
        self.collect_strings("SELECT account_number FROM sys_accounts WHERE balance < 0")
    }

    /// Transfers with a non-positive amount or identical endpoints
    pub fn check_invalid_transfers(&self) -> Result<Vec<String>> {
        self.collect_strings(
            "SELECT transfer_id FROM sys_transfers WHERE amount <= 0 OR from_account = to_account",
        )
    }

    /// Transfers whose source or destination account no longer exists
    pub fn check_orphaned_transfers(&self) -> Result<Vec<String>> {
        self.collect_strings(
            "SELECT t.transfer_id FROM sys_transfers t
             WHERE NOT EXISTS (SELECT 1 FROM sys_accounts a WHERE a.account_number = t.from_account)
                OR NOT EXISTS (SELECT 1 FROM sys_accounts a WHERE a.account_number = t.to_account)",
        )
    }

    fn collect_strings(&self, sql: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

// === Statement helpers shared by transactional operations ===

/// Conditional decrement: succeeds only if the balance covers `amount`
fn debit_if_sufficient(conn: &Connection, account: &AccountNumber, amount: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE sys_accounts SET balance = balance - ?
         WHERE account_number = ? AND balance >= ?",
        params![amount, account.as_str(), amount],
    )?;
    if updated == 1 {
        return Ok(());
    }

    // Nothing updated: either the account is gone or the funds are short
    let available: Option<i64> = conn
        .query_row(
            "SELECT balance FROM sys_accounts WHERE account_number = ?",
            [account.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match available {
        Some(available) => Err(Error::insufficient_funds(available, amount)),
        None => Err(Error::not_found(format!("Account {}", account))),
    }
}

fn credit(conn: &Connection, account: &AccountNumber, amount: i64) -> Result<()> {
    let updated = conn.execute(
        "UPDATE sys_accounts SET balance = balance + ? WHERE account_number = ?",
        params![amount, account.as_str()],
    )?;
    if updated == 0 {
        return Err(Error::not_found(format!("Account {}", account)));
    }
    Ok(())
}

fn read_balance(conn: &Connection, account: &AccountNumber) -> Result<i64> {
    conn.query_row(
        "SELECT balance FROM sys_accounts WHERE account_number = ?",
        [account.as_str()],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::not_found(format!("Account {}", account)))
}

fn insert_transfer(
    conn: &Connection,
    from: &AccountNumber,
    to: &AccountNumber,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<TransactionRecord> {
    let id = Uuid::new_v4();
    let sequence: i64 = conn.query_row("SELECT nextval('seq_transfers')", [], |row| row.get(0))?;
    conn.execute(
        "INSERT INTO sys_transfers (transfer_id, seq_no, from_account, to_account, amount, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            id.to_string(),
            sequence,
            from.as_str(),
            to.as_str(),
            amount,
            now.to_rfc3339(),
        ],
    )?;
    Ok(TransactionRecord {
        id,
        sequence,
        from_account: from.clone(),
        to_account: to.clone(),
        amount,
        timestamp: now,
    })
}

fn row_to_account(row: &duckdb::Row) -> duckdb::Result<Account> {
    // Column order follows ACCOUNT_COLUMNS
    let created_str: String = row.get(11)?;
    Ok(Account {
        account_number: AccountNumber::from_stored(row.get(0)?),
        username: row.get(1)?,
        password_hash: row.get(2)?,
        balance: row.get(3)?,
        profile: AccountProfile {
            full_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            national_id: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            phone: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            email: row.get(7)?,
            date_of_birth: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            gender: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        },
        terms_accepted: row.get(10)?,
        created_at: parse_timestamp(11, &created_str)?,
    })
}

/// Stored values that fail to parse surface as conversion errors
fn parse_timestamp(column: usize, s: &str) -> duckdb::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_uuid(column: usize, s: &str) -> duckdb::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| duckdb::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
