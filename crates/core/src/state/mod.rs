//! Persisted ingestion state.
//!
//! One document per running instance records, for every tracked
//! repository, the highest series id already discovered (the watermark)
//! and the ids still waiting for their remaining patches. Stores always
//! read and write the whole document.

mod document;
mod file_store;
mod memory_store;
mod sqlite_store;

pub use document::{RepoState, StateDocument};
pub use file_store::JsonFileStateStore;
pub use memory_store::MemoryStateStore;
pub use sqlite_store::SqliteStateStore;

use std::path::Path;

use thiserror::Error;

use crate::config::StateBackend;

/// Errors that can occur while loading or saving state.
#[derive(Debug, Error)]
pub enum StateError {
    /// IO error during file operations.
    #[error("State IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("State document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error.
    #[error("State database error: {0}")]
    Database(String),
}

/// Trait for state storage backends.
pub trait StateStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Read the whole document. A store that has never been written yields
    /// an empty document.
    fn load(&self) -> Result<StateDocument, StateError>;

    /// Overwrite the whole document.
    fn save(&self, document: &StateDocument) -> Result<(), StateError>;
}

/// Open the configured state backend at `path`.
pub fn open_state_store(
    backend: StateBackend,
    path: &Path,
) -> Result<Box<dyn StateStore>, StateError> {
    Ok(match backend {
        StateBackend::File => Box::new(JsonFileStateStore::new(path)),
        StateBackend::Sqlite => Box::new(SqliteStateStore::new(path)?),
    })
}

/// Read the document at `path` without creating or changing anything.
///
/// Used by dry runs, which must leave the configured state untouched.
pub fn read_state_snapshot(backend: StateBackend, path: &Path) -> Result<StateDocument, StateError> {
    match backend {
        StateBackend::File => JsonFileStateStore::new(path).load(),
        StateBackend::Sqlite => SqliteStateStore::read_snapshot(path),
    }
}
