//! Transfer service - moves money between accounts

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{AuthError, Error, ErrorKind, Result};
use crate::domain::{AccountNumber, Principal, TransferReceipt, TransferRequest};
use crate::ports::Clock;
use crate::services::credentials::CredentialService;
use crate::services::logging::{LogEvent, LoggingService};

pub struct TransferService {
    repository: Arc<DuckDbRepository>,
    credentials: Arc<CredentialService>,
    clock: Arc<dyn Clock>,
    logger: Arc<LoggingService>,
}

impl TransferService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        credentials: Arc<CredentialService>,
        clock: Arc<dyn Clock>,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            credentials,
            clock,
            logger,
        }
    }

    /// Transfer `request.amount` from the principal's account
    ///
    /// The caller's password is re-checked against a fresh read of the
    /// account. The debit is conditional at the storage layer, so a
    /// concurrent transfer that drained the balance after the pre-check
    /// still fails with `InsufficientFunds` and nothing is written.
    pub fn transfer(&self, principal: &Principal, request: &TransferRequest) -> Result<TransferReceipt> {
        let result = self.execute(principal, request);

        match &result {
            Ok(receipt) => self.logger.record(
                LogEvent::new("transfer_completed")
                    .with_operation("transfer")
                    .with_reference(receipt.record.id.to_string()),
            ),
            Err(e) => {
                let event = if e.kind() == ErrorKind::Dependency {
                    "transfer_failed"
                } else {
                    "transfer_rejected"
                };
                self.logger.record(
                    LogEvent::new(event)
                        .with_operation("transfer")
                        .with_reference(principal.account_number.as_str())
                        .with_failure(e),
                );
            }
        }
        result
    }

    fn execute(&self, principal: &Principal, request: &TransferRequest) -> Result<TransferReceipt> {
        let source = self
            .repository
            .find_by_account_number(&principal.account_number)?
            .ok_or(Error::Auth(AuthError::Unauthorized))?;
        if !self.credentials.verify(&request.password, &source.password_hash) {
            return Err(AuthError::WrongPassword.into());
        }

        let destination: AccountNumber = request
            .destination
            .parse()
            .map_err(|_| Error::not_found("Recipient account not found"))?;
        if self.repository.find_by_account_number(&destination)?.is_none() {
            return Err(Error::not_found("Recipient account not found"));
        }

        if request.amount <= 0 {
            return Err(Error::validation("Amount must be greater than zero"));
        }
        if destination == source.account_number {
            return Err(Error::validation("Cannot transfer to the same account"));
        }
        if source.balance < request.amount {
            return Err(Error::insufficient_funds(source.balance, request.amount));
        }

        let (record, new_balance) = self.repository.execute_transfer(
            &source.account_number,
            &destination,
            request.amount,
            self.clock.now(),
        )?;
        Ok(TransferReceipt { record, new_balance })
    }
}
