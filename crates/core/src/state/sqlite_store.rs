//! SQLite-backed state store.
//!
//! The document is kept as one JSON row, replaced as a whole on every save.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{StateDocument, StateError, StateStore};

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Create a new SQLite state store, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, StateError> {
        let conn = Connection::open(path).map_err(|e| StateError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite state store (useful for testing).
    pub fn in_memory() -> Result<Self, StateError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StateError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the stored document without creating or modifying anything.
    ///
    /// A missing database file or one without the state table reads as an
    /// empty document.
    pub fn read_snapshot(path: &Path) -> Result<StateDocument, StateError> {
        if !path.exists() {
            return Ok(StateDocument::new());
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StateError::Database(e.to_string()))?;

        let has_table: bool = conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'state_document')",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StateError::Database(e.to_string()))?;
        if !has_table {
            return Ok(StateDocument::new());
        }

        Self::read_document(&conn)
    }

    fn read_document(conn: &Connection) -> Result<StateDocument, StateError> {
        let body: Option<String> = conn
            .query_row("SELECT body FROM state_document WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| StateError::Database(e.to_string()))?;

        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Ok(StateDocument::new()),
        }
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StateError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS state_document (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StateError::Database(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|_| StateError::Database("state connection mutex poisoned".to_string()))
    }

    /// When the document was last written (RFC 3339), if ever.
    pub fn updated_at(&self) -> Result<Option<String>, StateError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT updated_at FROM state_document WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StateError::Database(e.to_string()))
    }
}

impl StateStore for SqliteStateStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn load(&self) -> Result<StateDocument, StateError> {
        let conn = self.lock()?;
        Self::read_document(&conn)
    }

    fn save(&self, document: &StateDocument) -> Result<(), StateError> {
        let body = serde_json::to_string(document)?;
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(|e| StateError::Database(e.to_string()))?;
        tx.execute(
            r#"
            INSERT INTO state_document (id, body, updated_at) VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
            params![body, Utc::now().to_rfc3339()],
        )
        .map_err(|e| StateError::Database(e.to_string()))?;
        tx.commit()
            .map_err(|e| StateError::Database(e.to_string()))?;

        Ok(())
    }
}
