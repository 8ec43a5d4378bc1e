//! Account service - registration and account queries

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{AuthError, Error, Result};
use crate::domain::{Account, AccountNumber, NewAccount, Principal, RegistrationRequest};
use crate::ports::Clock;
use crate::services::credentials::CredentialService;
use crate::services::logging::{LogEvent, LoggingService};

/// Balance inquiry result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub username: String,
    pub balance: i64,
}

/// Identity of the logged-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub username: String,
    pub account_number: AccountNumber,
}

pub struct AccountService {
    repository: Arc<DuckDbRepository>,
    credentials: Arc<CredentialService>,
    clock: Arc<dyn Clock>,
    logger: Arc<LoggingService>,
    opening_balance: i64,
}

impl AccountService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        credentials: Arc<CredentialService>,
        clock: Arc<dyn Clock>,
        logger: Arc<LoggingService>,
        opening_balance: i64,
    ) -> Self {
        Self {
            repository,
            credentials,
            clock,
            logger,
            opening_balance,
        }
    }

    /// Register a new account with the configured opening balance
    pub fn register(&self, request: &RegistrationRequest) -> Result<Account> {
        let result = self.create(request);
        self.logger.record_dependency_failure("register", &result);
        result
    }

    fn create(&self, request: &RegistrationRequest) -> Result<Account> {
        request.validate()?;
        let username = request.username.trim();

        // Re-checked atomically by the store
        if self.repository.find_by_username(username)?.is_some() {
            return Err(Error::conflict("Username already exists"));
        }

        let new_account = NewAccount {
            username: username.to_string(),
            password_hash: self.credentials.hash(&request.password)?,
            opening_balance: self.opening_balance,
            profile: request.profile.clone(),
            terms_accepted: request.terms_accepted,
        };

        let mut rng = rand::thread_rng();
        let mut next_number = || AccountNumber::random(&mut rng);
        let account = self
            .repository
            .create_account(&new_account, &mut next_number, self.clock.now())?;

        self.logger.record(
            LogEvent::new("account_registered")
                .with_operation("register")
                .with_reference(account.account_number.as_str()),
        );
        Ok(account)
    }

    fn load(&self, principal: &Principal) -> Result<Account> {
        self.repository
            .find_by_account_number(&principal.account_number)?
            .ok_or(Error::Auth(AuthError::Unauthorized))
    }

    /// Fresh balance of the principal's account
    pub fn balance(&self, principal: &Principal) -> Result<BalanceView> {
        let result = self.load(principal).map(|account| BalanceView {
            username: account.username,
            balance: account.balance,
        });
        self.logger.record_dependency_failure("balance", &result);
        result
    }

    pub fn current_user(&self, principal: &Principal) -> Result<CurrentUser> {
        let result = self.load(principal).map(|account| CurrentUser {
            username: account.username,
            account_number: account.account_number,
        });
        self.logger.record_dependency_failure("current_user", &result);
        result
    }

    /// Administrative removal; ledger history is kept
    pub fn delete_account(&self, account_number: &AccountNumber) -> Result<()> {
        let result = self.repository.delete_account(account_number);
        self.logger.record_dependency_failure("delete_account", &result);
        result?;
        self.logger.record(
            LogEvent::new("account_deleted")
                .with_operation("delete_account")
                .with_reference(account_number.as_str()),
        );
        Ok(())
    }
}
