//! Ledger service - per-account transaction history

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::{HistoryEntry, Principal};
use crate::services::logging::LoggingService;

pub struct LedgerService {
    repository: Arc<DuckDbRepository>,
    logger: Arc<LoggingService>,
}

impl LedgerService {
    pub fn new(repository: Arc<DuckDbRepository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    /// Transfers touching the principal's account, newest first
    pub fn history(&self, principal: &Principal) -> Result<Vec<HistoryEntry>> {
        let result = self.repository.history_for_account(&principal.account_number);
        self.logger.record_dependency_failure("history", &result);
        result
    }
}
