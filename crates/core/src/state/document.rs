//! The state document and its update rules.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Per-repository ingestion state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoState {
    /// Highest series id returned by discovery so far; never decreases.
    #[serde(default)]
    pub last_series_seen: u64,
    /// Series seen with `received_all = false` and not dispatched yet.
    #[serde(default)]
    pub incomplete_series: BTreeSet<u64>,
}

impl RepoState {
    /// Raise the watermark to `series_id`. Returns whether it moved.
    pub fn advance_watermark(&mut self, series_id: u64) -> bool {
        if series_id > self.last_series_seen {
            self.last_series_seen = series_id;
            true
        } else {
            false
        }
    }

    /// Record a series as waiting for more patches. Returns whether it was new.
    pub fn mark_incomplete(&mut self, series_id: u64) -> bool {
        self.incomplete_series.insert(series_id)
    }

    /// Stop tracking a pending series. Returns whether it was pending.
    pub fn resolve(&mut self, series_id: u64) -> bool {
        self.incomplete_series.remove(&series_id)
    }

    /// Whether `series_id` is waiting for more patches.
    pub fn is_incomplete(&self, series_id: u64) -> bool {
        self.incomplete_series.contains(&series_id)
    }
}

/// The whole persisted document, keyed by repository name.
///
/// Ordered maps and sets keep the serialized form stable, so a run that
/// changes nothing writes byte-identical output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDocument {
    pub repos: BTreeMap<String, RepoState>,
}

impl StateDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty entry for `repo` if missing. Returns whether it was created.
    pub fn ensure_repo(&mut self, repo: &str) -> bool {
        if self.repos.contains_key(repo) {
            return false;
        }
        self.repos.insert(repo.to_string(), RepoState::default());
        true
    }

    /// State of `repo`, if tracked.
    pub fn repo(&self, repo: &str) -> Option<&RepoState> {
        self.repos.get(repo)
    }

    /// Mutable state of `repo`, created empty if missing.
    pub fn repo_mut(&mut self, repo: &str) -> &mut RepoState {
        self.repos.entry(repo.to_string()).or_default()
    }

    /// Watermark of `repo` (0 when untracked).
    pub fn watermark(&self, repo: &str) -> u64 {
        self.repo(repo).map(|r| r.last_series_seen).unwrap_or(0)
    }

    /// Pretty-printed JSON, as the file store writes it (before its
    /// trailing newline).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
