//! WhatsApp sessions known to the dashboard.
//!
//! Pairing a session with a phone happens on the backend; the dashboard only
//! keeps the registry of named sessions and their last known status.

use chrono::{SecondsFormat, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

use crate::api::models::{SessionStatus, WhatsAppSession};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session name must not be empty")]
    EmptyName,
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for SessionError {
    fn from(e: rusqlite::Error) -> Self {
        SessionError::Storage(e.to_string())
    }
}

/// Source of the session list. Newest sessions come first.
pub trait SessionProvider {
    fn list(&self) -> Result<Vec<WhatsAppSession>, SessionError>;

    fn create(&self, name: &str) -> Result<WhatsAppSession, SessionError>;

    /// Remove a session, returning what was removed.
    fn delete(&self, id: &str) -> Result<WhatsAppSession, SessionError>;

    fn connected(&self) -> Result<Vec<WhatsAppSession>, SessionError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(WhatsAppSession::is_connected)
            .collect())
    }
}

static SEQ: AtomicU32 = AtomicU32::new(0);

/// A fresh, disconnected session named `name` (trimmed).
pub fn new_session(name: &str) -> Result<WhatsAppSession, SessionError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SessionError::EmptyName);
    }
    let now = Utc::now();
    let seq = SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    Ok(WhatsAppSession {
        id: format!("session_{}_{seq:03}", now.timestamp_millis()),
        name: name.to_string(),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        status: SessionStatus::Disconnected,
        phone_number: None,
    })
}

#[derive(Default)]
pub struct InMemorySessionProvider {
    sessions: Mutex<Vec<WhatsAppSession>>,
}

impl InMemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<WhatsAppSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<WhatsAppSession>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Storage(e.to_string()))
    }
}

impl SessionProvider for InMemorySessionProvider {
    fn list(&self) -> Result<Vec<WhatsAppSession>, SessionError> {
        Ok(self.lock()?.clone())
    }

    fn create(&self, name: &str) -> Result<WhatsAppSession, SessionError> {
        let session = new_session(name)?;
        self.lock()?.insert(0, session.clone());
        Ok(session)
    }

    fn delete(&self, id: &str) -> Result<WhatsAppSession, SessionError> {
        let mut sessions = self.lock()?;
        let pos = sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        Ok(sessions.remove(pos))
    }
}
