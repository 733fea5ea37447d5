//! JSON file state store.
//!
//! Writes are atomic: the document goes to `<path>.tmp`, is fsynced, then
//! renamed over `<path>` and the parent directory is fsynced. A reader sees
//! either the old or the new document, never a partial one.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{StateDocument, StateError, StateStore};

/// State store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StateStore for JsonFileStateStore {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<StateDocument, StateError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, starting empty");
                return Ok(StateDocument::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StateDocument::new());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    fn save(&self, document: &StateDocument) -> Result<(), StateError> {
        let parent = self.parent_dir();
        std::fs::create_dir_all(&parent)?;

        let tmp_path = self.tmp_path();
        let mut bytes = document.to_json_pretty()?.into_bytes();
        bytes.push(b'\n');

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        File::open(&parent)?.sync_all()?;

        debug!(path = %self.path.display(), "State saved");
        Ok(())
    }
}
