//! Result and error types for the core library


use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("Incorrect password")]
    WrongPassword,

    #[error("Please log in first")]
    Unauthorized,

    #[error("Password reset has not been authorized for this session")]
    ResetNotAuthorized,

    #[error("Session expired. Please start again.")]
    SessionExpired,
}

/// OTP verification failures, see [`crate::domain::OtpVerification::into_result`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("OTP expired. Please request a new OTP.")]
    Expired,

    #[error("Incorrect OTP. Please try again.")]
    Incorrect,

    #[error("OTP expired or not requested. Please request a new OTP.")]
    NoActiveChallenge,

    #[error("Too many incorrect attempts. Please request a new OTP.")]
    AttemptsExhausted,
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Auth(AuthError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("{0}")]
    Otp(OtpError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Email delivery error: {0}")]
    Delivery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification used for logging and user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Auth,
    Conflict,
    InsufficientFunds,
    Otp,
    Dependency,
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an email delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    pub fn insufficient_funds(available: i64, requested: i64) -> Self {
        Self::InsufficientFunds {
            available,
            requested,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Error::Otp(_) => ErrorKind::Otp,
            Error::Database(_)
            | Error::Delivery(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Dependency,
        }
    }

    /// Message that is safe to show to an end user.
    ///
    /// Dependency failures collapse into a generic message; their detail
    /// belongs in the event log only.
    pub fn public_message(&self) -> String {
        match self {
            Error::InsufficientFunds { .. } => "Insufficient funds".to_string(),
            Error::Delivery(_) => "Failed to send OTP email. Please try again.".to_string(),
            e if e.kind() == ErrorKind::Dependency => {
                "Something went wrong. Please try again later.".to_string()
            }
            e => e.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<OtpError> for Error {
    fn from(e: OtpError) -> Self {
        Self::Otp(e)
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation outcome envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.public_message()),
                error_kind: Some(e.kind()),
            },
        }
    }
}
