//! In-memory state store.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{StateDocument, StateError, StateStore};

/// State store that keeps the last saved document in memory.
///
/// Used by dry runs (seeded from the real store so nothing is written back)
/// and by tests, which can inspect how many saves a run performed and make
/// the next save fail.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    document: RwLock<StateDocument>,
    saves: AtomicUsize,
    fail_next_save: AtomicBool,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document.
    pub fn seeded(document: StateDocument) -> Self {
        Self {
            document: RwLock::new(document),
            ..Default::default()
        }
    }

    /// The last saved document.
    pub fn snapshot(&self) -> Result<StateDocument, StateError> {
        self.document
            .read()
            .map(|doc| doc.clone())
            .map_err(|_| StateError::Database("memory store lock poisoned".to_string()))
    }

    /// Number of successful `save` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make the next `save` fail without touching the stored document.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStateStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self) -> Result<StateDocument, StateError> {
        self.snapshot()
    }

    fn save(&self, document: &StateDocument) -> Result<(), StateError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StateError::Io(std::io::Error::other(
                "No space left on device",
            )));
        }

        let mut guard = self
            .document
            .write()
            .map_err(|_| StateError::Database("memory store lock poisoned".to_string()))?;
        *guard = document.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_seeded_store_counts_saves() {
        let mut doc = StateDocument::new();
        doc.repo_mut("a").advance_watermark(4);

        let store = MemoryStateStore::seeded(doc.clone());
        assert_eq!(store.load().unwrap(), doc);
        assert_eq!(store.save_count(), 0);

        doc.repo_mut("a").advance_watermark(8);
        store.save(&doc).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot().unwrap().watermark("a"), 8);
    }

    #[test]
    fn test_injected_save_failure_is_one_shot() {
        let store = MemoryStateStore::new();
        let mut doc = StateDocument::new();
        doc.repo_mut("a").advance_watermark(3);

        store.fail_next_save();
        assert!(matches!(store.save(&doc), Err(StateError::Io(_))));
        assert_eq!(store.load().unwrap(), StateDocument::new());
        assert_eq!(store.save_count(), 0);

        store.save(&doc).unwrap();
        assert_eq!(store.load().unwrap(), doc);
    }

    #[test]
    fn test_poisoned_lock_is_an_error() {
        let store = Arc::new(MemoryStateStore::new());

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.document.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.load(), Err(StateError::Database(_))));
        assert!(store.save(&StateDocument::new()).is_err());
    }
}
