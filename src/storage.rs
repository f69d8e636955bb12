use crate::api::models::{SessionStatus, WhatsAppSession};
use crate::sessions::{SessionError, SessionProvider, new_session};
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};

pub fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "WaDash")?;
    Some(proj.data_dir().join("sessions.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Session registry kept in a local SQLite file.
pub struct SqliteSessionProvider {
    path: PathBuf,
}

impl SqliteSessionProvider {
    /// Open (creating if needed) the registry at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let provider = Self { path: path.into() };
        ensure_dir(&provider.path).map_err(|e| SessionError::Storage(e.to_string()))?;
        provider.init()?;
        Ok(provider)
    }

    pub fn open_default() -> Result<Self, SessionError> {
        let path = default_db_path().ok_or_else(|| SessionError::Storage("no data dir".into()))?;
        Self::open(path)
    }

    fn conn(&self) -> Result<Connection, SessionError> {
        Ok(Connection::open(&self.path)?)
    }

    fn init(&self) -> Result<(), SessionError> {
        self.conn()?.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                status TEXT NOT NULL,
                phone_number TEXT
            );
            "#,
        )?;
        Ok(())
    }

    /// Record a status reported by the backend.
    pub fn set_status(
        &self,
        id: &str,
        status: SessionStatus,
        phone_number: Option<&str>,
    ) -> Result<(), SessionError> {
        let changed = self.conn()?.execute(
            "UPDATE sessions SET status = ?2, phone_number = ?3 WHERE id = ?1",
            params![id, status.as_str(), phone_number],
        )?;
        if changed == 0 {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn get(conn: &Connection, id: &str) -> Result<Option<WhatsAppSession>, SessionError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, status, phone_number FROM sessions WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], row_to_session).optional()?)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<WhatsAppSession> {
    let status: String = row.get(3)?;
    Ok(WhatsAppSession {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Error),
        phone_number: row.get(4)?,
    })
}

impl SessionProvider for SqliteSessionProvider {
    fn list(&self) -> Result<Vec<WhatsAppSession>, SessionError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, status, phone_number FROM sessions
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    fn create(&self, name: &str) -> Result<WhatsAppSession, SessionError> {
        let session = new_session(name)?;
        self.conn()?.execute(
            "INSERT INTO sessions (id, name, created_at, status, phone_number)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.name,
                session.created_at,
                session.status.as_str(),
                session.phone_number
            ],
        )?;
        Ok(session)
    }

    fn delete(&self, id: &str) -> Result<WhatsAppSession, SessionError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let session =
            Self::get(&tx, id)?.ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(session)
    }
}
