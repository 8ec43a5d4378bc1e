//! Auth service - sessions, login and the current principal

use std::sync::Arc;

use crate::adapters::duckdb::DuckDbRepository;
use crate::adapters::session::InMemorySessionStore;
use crate::domain::result::{AuthError, Error, Result};
use crate::domain::{Account, Principal, SessionId};
use crate::ports::Clock;
use crate::services::credentials::CredentialService;
use crate::services::logging::{LogEvent, LoggingService};

/// Maps sessions to authenticated principals
pub struct AuthService {
    repository: Arc<DuckDbRepository>,
    credentials: Arc<CredentialService>,
    sessions: Arc<InMemorySessionStore>,
    clock: Arc<dyn Clock>,
    logger: Arc<LoggingService>,
}

impl AuthService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        credentials: Arc<CredentialService>,
        sessions: Arc<InMemorySessionStore>,
        clock: Arc<dyn Clock>,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self {
            repository,
            credentials,
            sessions,
            clock,
            logger,
        }
    }

    /// Start an anonymous session
    pub fn open_session(&self) -> Result<SessionId> {
        let result = self.sessions.open(self.clock.now());
        self.logger.record_dependency_failure("open_session", &result);
        result
    }

    /// Authenticate `username` and attach the principal to the session
    pub fn login(&self, session_id: &SessionId, username: &str, password: &str) -> Result<Principal> {
        let now = self.clock.now();
        let result = self.check_credentials(username, password).and_then(|account| {
            let principal = Principal::for_account(&account, now);
            let attached = principal.clone();
            self.sessions
                .with_session(session_id, now, move |session| session.principal = Some(attached))?
                .ok_or(Error::Auth(AuthError::SessionExpired))?;
            Ok(principal)
        });

        match &result {
            Ok(principal) => self.logger.record(
                LogEvent::new("login_succeeded")
                    .with_operation("login")
                    .with_reference(principal.account_number.as_str()),
            ),
            Err(e) => self
                .logger
                .record(LogEvent::new("login_failed").with_operation("login").with_failure(e)),
        }
        result
    }

    fn check_credentials(&self, username: &str, password: &str) -> Result<Account> {
        let account = self
            .repository
            .find_by_username(username)?
            .ok_or_else(|| Error::not_found("User not found"))?;
        if !self.credentials.verify(password, &account.password_hash) {
            return Err(AuthError::WrongPassword.into());
        }
        Ok(account)
    }

    /// Principal attached to a live session
    pub fn current_principal(&self, session_id: &SessionId) -> Result<Principal> {
        let result = self
            .sessions
            .with_session(session_id, self.clock.now(), |session| session.principal.clone());
        self.logger.record_dependency_failure("current_principal", &result);
        result?.flatten().ok_or(Error::Auth(AuthError::Unauthorized))
    }

    /// End a session; unknown sessions are ignored
    pub fn logout(&self, session_id: &SessionId) -> Result<()> {
        let removed = self.sessions.remove(session_id);
        self.logger.record_dependency_failure("logout", &removed);
        if removed? {
            self.logger.record(LogEvent::new("logout").with_operation("logout"));
        }
        Ok(())
    }
}
