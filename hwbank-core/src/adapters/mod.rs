//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the account store and transfer ledger
//! - HTTPS relay and local outbox for the EmailSender port
//! - Manual clock for the Clock port
//! - In-process session store

pub mod clock;
pub mod duckdb;
pub mod email;
pub mod session;
