//! Status service - bank-wide summary

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::services::logging::LoggingService;

/// Status service for bank summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
    logger: Arc<LoggingService>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let result = self.summarize();
        self.logger.record_dependency_failure("status", &result);
        result
    }

    fn summarize(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            total_accounts: self.repository.get_account_count()?,
            total_transfers: self.repository.get_transfer_count()?,
            total_money: self.repository.get_total_balance()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_accounts: i64,
    pub total_transfers: i64,
    /// Sum of all balances in minor units
    pub total_money: i64,
}
