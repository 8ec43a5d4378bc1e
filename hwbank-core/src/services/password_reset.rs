//! Password reset service - OTP-gated credential recovery
//!
//! Flow per session: `request_otp(email)` -> `verify_otp(code)` ->
//! `reset_password(new)`. The reset is only authorized by a grant left in
//! the session by a successful verification, and the grant is spent by the
//! reset.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::session::InMemorySessionStore;
use crate::domain::result::{AuthError, Error, Result};
use crate::domain::{normalize_email, OtpChallenge, OtpEngine, OtpVerification, ResetAuthorization, SessionId};
use crate::ports::{Clock, EmailMessage, EmailSender};
use crate::services::credentials::CredentialService;
use crate::services::logging::{LogEvent, LoggingService};

pub const OTP_SUBJECT: &str = "Your One-Time Password (OTP) Verification Code";

/// Confirmation that a code was sent
#[derive(Debug, Clone, Serialize)]
pub struct OtpIssued {
    pub expires_at: DateTime<Utc>,
}

fn otp_message(to: &str, code: &str, ttl_minutes: i64) -> EmailMessage {
    let text = format!(
        "Dear Customer,\n\n\
         Your One-Time Password (OTP) is: {code}\n\n\
         This code is valid for {ttl_minutes} minutes. Do not share it with anyone.\n\n\
         If you did not request a password reset, please ignore this email.\n\n\
         HelloWorld Bank"
    );
    let html = format!(
        "<p>Dear Customer,</p>\
         <p>Your One-Time Password (OTP) is: <strong>{code}</strong></p>\
         <p>This code is valid for {ttl_minutes} minutes. Do not share it with anyone.</p>\
         <p>If you did not request a password reset, please ignore this email.</p>\
         <p>HelloWorld Bank</p>"
    );
    EmailMessage {
        to: to.to_string(),
        subject: OTP_SUBJECT.to_string(),
        text,
        html: Some(html),
    }
}

pub struct PasswordResetService {
    repository: Arc<DuckDbRepository>,
    credentials: Arc<CredentialService>,
    sessions: Arc<InMemorySessionStore>,
    email_sender: Arc<dyn EmailSender>,
    otp: OtpEngine,
    clock: Arc<dyn Clock>,
    logger: Arc<LoggingService>,
}

impl PasswordResetService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        credentials: Arc<CredentialService>,
        sessions: Arc<InMemorySessionStore>,
        email_sender: Arc<dyn EmailSender>,
        otp: OtpEngine,
        clock: Arc<dyn Clock>,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            credentials,
            sessions,
            email_sender,
            otp,
            clock,
            logger,
        }
    }

    /// Issue a code for the account owning `email` and send it there
    ///
    /// A failed delivery removes the challenge again, leaving the session
    /// as it was before the request (minus any earlier challenge).
    pub fn request_otp(&self, session_id: &SessionId, email: &str) -> Result<OtpIssued> {
        let result = self.issue_and_send(session_id, email);
        // Delivery failures are already logged as otp_delivery_failed
        if !matches!(result, Err(Error::Delivery(_))) {
            self.logger.record_dependency_failure("request_otp", &result);
        }
        result
    }

    fn issue_and_send(&self, session_id: &SessionId, email: &str) -> Result<OtpIssued> {
        let account = self
            .repository
            .find_by_email(email)?
            .ok_or_else(|| Error::not_found("No user found with that email"))?;
        let bound_email = normalize_email(&account.profile.email);

        let now = self.clock.now();
        let challenge: OtpChallenge = self
            .sessions
            .with_session(session_id, now, |session| {
                self.otp.issue(session, &bound_email, &mut rand::thread_rng(), now)
            })?
            .ok_or(Error::Auth(AuthError::SessionExpired))?;

        let message = otp_message(&bound_email, &challenge.code, self.otp.ttl().num_minutes());
        if let Err(e) = self.email_sender.send(&message) {
            self.sessions
                .with_session(session_id, self.clock.now(), |session| {
                    self.otp.rollback(session, &challenge)
                })?;
            self.logger.record(
                LogEvent::new("otp_delivery_failed")
                    .with_operation("request_otp")
                    .with_reference(account.account_number.as_str())
                    .with_failure(&e),
            );
            return Err(e);
        }

        self.logger.record(
            LogEvent::new("otp_issued")
                .with_operation("request_otp")
                .with_reference(account.account_number.as_str()),
        );
        Ok(OtpIssued {
            expires_at: challenge.expires_at,
        })
    }

    /// Check a submitted code against the session's challenge
    pub fn verify_otp(&self, session_id: &SessionId, code: &str) -> Result<OtpVerification> {
        let now = self.clock.now();
        let outcome = self
            .sessions
            .with_session(session_id, now, |session| self.otp.verify(session, code, now));
        self.logger.record_dependency_failure("verify_otp", &outcome);
        let outcome = outcome?.ok_or(Error::Auth(AuthError::SessionExpired))?;

        let event = match outcome.clone().into_result() {
            Ok(_) => LogEvent::new("otp_verified"),
            Err(e) => LogEvent::new("otp_rejected").with_failure(&Error::Otp(e)),
        };
        self.logger.record(event.with_operation("verify_otp"));
        Ok(outcome)
    }

    /// Set a new password for the account whose email the session verified
    pub fn reset_password(
        &self,
        session_id: &SessionId,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<()> {
        let result = self.apply_reset(session_id, new_password, confirm_password);
        match &result {
            Ok(()) => self
                .logger
                .record(LogEvent::new("password_reset").with_operation("reset_password")),
            Err(e) => self.logger.record(
                LogEvent::new("password_reset_denied")
                    .with_operation("reset_password")
                    .with_failure(e),
            ),
        }
        result
    }

    fn apply_reset(&self, session_id: &SessionId, new_password: &str, confirm_password: &str) -> Result<()> {
        if new_password != confirm_password {
            return Err(Error::validation("Passwords do not match"));
        }
        if new_password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }

        let now = self.clock.now();
        let granted_email = self
            .sessions
            .with_session(session_id, now, |session| {
                session.reset_grant.as_ref().map(|grant| grant.email.clone())
            })?
            .ok_or(Error::Auth(AuthError::SessionExpired))?
            .ok_or(Error::Auth(AuthError::ResetNotAuthorized))?;

        let account = self
            .repository
            .find_by_email(&granted_email)?
            .ok_or_else(|| Error::not_found("No user found with that email"))?;
        let password_hash = self.credentials.hash(new_password)?;

        let authorization = self
            .sessions
            .with_session(session_id, self.clock.now(), |session| {
                self.otp.consume_for_reset(session, &account.profile.email)
            })?
            .ok_or(Error::Auth(AuthError::SessionExpired))?;
        if authorization != ResetAuthorization::Authorized {
            return Err(AuthError::ResetNotAuthorized.into());
        }

        self.repository
            .update_password_hash(&account.profile.email, &password_hash)
    }
}
