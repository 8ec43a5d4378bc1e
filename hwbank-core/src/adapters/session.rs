//! In-process session store

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::{Session, SessionId};

/// Sessions keyed by id, guarded by a single lock
///
/// Every read or mutation of a session happens while the lock is held, so
/// OTP state changes within one session are serialized. Idle sessions are
/// evicted when accessed, and all of them are swept whenever a new session
/// is opened.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    idle_timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .lock()
            .map_err(|e| Error::database(format!("Session store lock poisoned: {}", e)))
    }

    /// Create an empty session, dropping every idle one
    pub fn open(&self, now: DateTime<Utc>) -> Result<SessionId> {
        let id = SessionId::generate();
        let mut sessions = self.lock()?;
        sessions.retain(|_, session| !session.is_idle(now, self.idle_timeout));
        sessions.insert(id.clone(), Session::new(id.clone(), now));
        Ok(id)
    }

    /// Snapshot of a live session
    pub fn get(&self, id: &SessionId, now: DateTime<Utc>) -> Result<Option<Session>> {
        self.with_session(id, now, |session| session.clone())
    }

    /// Run `f` against a live session under the store lock
    ///
    /// Returns `None` when the session is unknown or idle past the timeout.
    /// Touches `last_seen_at`.
    pub fn with_session<R>(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<Option<R>> {
        let mut sessions = self.lock()?;
        let expired = match sessions.get(id) {
            Some(session) => session.is_idle(now, self.idle_timeout),
            None => return Ok(None),
        };
        if expired {
            sessions.remove(id);
            return Ok(None);
        }

        let Some(session) = sessions.get_mut(id) else {
            return Ok(None);
        };
        session.last_seen_at = now;
        Ok(Some(f(session)))
    }

    /// Terminate a session; returns whether it existed
    pub fn remove(&self, id: &SessionId) -> Result<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
