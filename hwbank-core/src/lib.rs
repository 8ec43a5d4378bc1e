//! HelloWorld Bank core - accounts, transfers and OTP-gated password recovery
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, TransactionRecord, Session, OTP state machine)
//! - **ports**: Trait definitions for external collaborators (EmailSender, Clock)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, email relay/outbox, session store)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;

use adapters::duckdb::DuckDbRepository;
use adapters::email::{HttpEmailRelay, OutboxEmailSender};
use adapters::session::InMemorySessionStore;
use config::Config;
use ports::{Clock, EmailSender, SystemClock};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, OperationResult};
pub use domain::{
    Account, AccountNumber, AccountProfile, Direction, HistoryEntry, OtpVerification, Principal,
    RegistrationRequest, SessionId, TransactionRecord, TransferReceipt, TransferRequest,
};

/// Main context for bank operations
///
/// Holds the store, configuration and all services. Services share the
/// repository, session store, clock and event log.
pub struct BankContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub sessions: Arc<InMemorySessionStore>,
    pub logger: Arc<LoggingService>,
    pub account_service: AccountService,
    pub auth_service: AuthService,
    pub transfer_service: TransferService,
    pub ledger_service: LedgerService,
    pub password_reset_service: PasswordResetService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl BankContext {
    /// Open the bank stored in `bank_dir`
    ///
    /// Uses the HTTPS relay when one is configured, otherwise the local
    /// outbox file.
    pub fn new(bank_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(bank_dir)?;
        let config = Config::load(bank_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&bank_dir.join("bank.duckdb"))?);
        repository.ensure_schema()?;

        let email_sender: Arc<dyn EmailSender> = match &config.email.relay_url {
            Some(url) => Arc::new(HttpEmailRelay::new(
                url,
                config.email.api_key.clone(),
                config.email.from_address.clone(),
            )?),
            None => Arc::new(OutboxEmailSender::new(bank_dir, config.email.from_address.clone())),
        };

        let logger = Arc::new(LoggingService::new(
            bank_dir,
            entry_point,
            env!("CARGO_PKG_VERSION"),
        )?);

        Ok(Self::with_components(
            config,
            repository,
            email_sender,
            Arc::new(SystemClock),
            logger,
        ))
    }

    /// Assemble a context from existing components (tests, embedding)
    ///
    /// The repository schema must already be in place.
    pub fn with_components(
        config: Config,
        repository: Arc<DuckDbRepository>,
        email_sender: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        logger: Arc<LoggingService>,
    ) -> Self {
        let credentials = Arc::new(CredentialService::new(config.credentials));
        let sessions = Arc::new(InMemorySessionStore::new(Duration::seconds(
            config.session_idle_seconds,
        )));
        let otp = domain::OtpEngine::new(
            Duration::seconds(config.otp_ttl_seconds),
            config.otp_max_attempts,
        );

        let account_service = AccountService::new(
            Arc::clone(&repository),
            Arc::clone(&credentials),
            Arc::clone(&clock),
            Arc::clone(&logger),
            config.opening_balance,
        );
        let auth_service = AuthService::new(
            Arc::clone(&repository),
            Arc::clone(&credentials),
            Arc::clone(&sessions),
            Arc::clone(&clock),
            Arc::clone(&logger),
        );
        let transfer_service = TransferService::new(
            Arc::clone(&repository),
            Arc::clone(&credentials),
            Arc::clone(&clock),
            Arc::clone(&logger),
        );
        let ledger_service = LedgerService::new(Arc::clone(&repository), Arc::clone(&logger));
        let password_reset_service = PasswordResetService::new(
            Arc::clone(&repository),
            Arc::clone(&credentials),
            Arc::clone(&sessions),
            email_sender,
            otp,
            clock,
            Arc::clone(&logger),
        );
        let status_service = StatusService::new(Arc::clone(&repository), Arc::clone(&logger));
        let doctor_service = DoctorService::new(Arc::clone(&repository), Arc::clone(&logger));

        Self {
            config,
            repository,
            sessions,
            logger,
            account_service,
            auth_service,
            transfer_service,
            ledger_service,
            password_reset_service,
            status_service,
            doctor_service,
        }
    }
}
