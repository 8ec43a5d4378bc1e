//! Doctor service - ledger integrity checks

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::services::logging::LoggingService;

/// Doctor service for integrity checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
    logger: Arc<LoggingService>,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>, logger: Arc<LoggingService>) -> Self {
        Self { repository, logger }
    }

    /// Run all integrity checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let result = self.check_all();
        self.logger.record_dependency_failure("doctor", &result);
        result
    }

    fn check_all(&self) -> Result<DoctorResult> {
        let mut checks = HashMap::new();

        let negative = self.repository.check_negative_balances()?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                &negative,
                "error",
                "No account has a negative balance".to_string(),
                format!("{} account(s) have a negative balance", negative.len()),
                |id| json!({ "account_number": id }),
            ),
        );

        let invalid = self.repository.check_invalid_transfers()?;
        checks.insert(
            "invalid_transfers".to_string(),
            CheckResult::from_findings(
                &invalid,
                "error",
                "All transfers have a positive amount and distinct accounts".to_string(),
                format!("{} transfer(s) are non-positive or self-transfers", invalid.len()),
                |id| json!({ "transfer_id": id }),
            ),
        );

        // Administrative deletes leave these behind
        let orphaned = self.repository.check_orphaned_transfers()?;
        checks.insert(
            "orphaned_transfers".to_string(),
            CheckResult::from_findings(
                &orphaned,
                "warning",
                "All transfers reference existing accounts".to_string(),
                format!("{} transfer(s) reference closed accounts", orphaned.len()),
                |id| json!({ "transfer_id": id }),
            ),
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary { passed, warnings, errors },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings(
        findings: &[String],
        failure_status: &str,
        pass_message: String,
        failure_message: String,
        detail: impl Fn(&str) -> serde_json::Value,
    ) -> Self {
        if findings.is_empty() {
            return Self {
                status: "pass".to_string(),
                message: pass_message,
                details: None,
            };
        }
        Self {
            status: failure_status.to_string(),
            message: failure_message,
            details: Some(findings.iter().map(|f| detail(f)).collect()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
