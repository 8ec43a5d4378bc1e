//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod auth;
pub mod credentials;
mod doctor;
mod ledger;
pub mod logging;
pub mod migration;
pub mod password_reset;
mod status;
mod transfer;

pub use account::{AccountService, BalanceView, CurrentUser};
pub use auth::AuthService;
pub use credentials::CredentialService;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use ledger::LedgerService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use password_reset::{OtpIssued, PasswordResetService};
pub use status::{StatusService, StatusSummary};
pub use transfer::TransferService;
