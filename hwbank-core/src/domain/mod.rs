//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic and the OTP state machine - no I/O.

mod account;
pub mod credentials;
pub mod otp;
pub mod result;
mod session;
mod transaction;

pub use account::{normalize_email, Account, AccountNumber, AccountProfile, NewAccount, RegistrationRequest};
pub use credentials::Argon2Params;
pub use otp::{OtpChallenge, OtpEngine, OtpVerification, ResetAuthorization};
pub use session::{Principal, ResetGrant, Session, SessionId};
pub use transaction::{Direction, HistoryEntry, TransactionRecord, TransferReceipt, TransferRequest};
