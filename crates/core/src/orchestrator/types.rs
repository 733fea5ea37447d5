//! Types for the ingestion orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::patchwork::PatchworkError;
use crate::state::StateError;

/// Errors that abort one repository's run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Listing new series failed; the watermark was left untouched.
    #[error("discovery failed: {0}")]
    Discovery(#[source] PatchworkError),

    /// The state document could not be saved.
    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// What happened to one repository during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoSummary {
    /// Pending series looked up again.
    pub rechecked: usize,
    /// Pending series whose lookup failed and stay pending.
    pub recheck_errors: usize,
    /// Series newer than the watermark returned by discovery.
    pub discovered: usize,
    /// Series whose build was submitted.
    pub dispatched: Vec<u64>,
    /// Complete series whose submission failed (not retried).
    pub dispatch_failures: Vec<u64>,
    /// Complete series skipped because their record was malformed.
    pub malformed: Vec<u64>,
    /// Series discovered incomplete and queued for recheck.
    pub newly_incomplete: Vec<u64>,
    /// Pending series Patchwork no longer knows about.
    pub dropped: Vec<u64>,
    /// Watermark after the run.
    pub watermark: u64,
    /// Series still pending after the run.
    pub pending: usize,
}

/// Outcome of one repository's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepoOutcome {
    Completed(RepoSummary),
    Failed { error: String },
}

/// Per-repository entry of a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoReport {
    pub repo: String,
    pub outcome: RepoOutcome,
}

/// Result of one ingestion run across all repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub repos: Vec<RepoReport>,
}

impl RunReport {
    /// Names of repositories whose run was aborted.
    pub fn failed_repos(&self) -> Vec<&str> {
        self.repos
            .iter()
            .filter(|r| matches!(r.outcome, RepoOutcome::Failed { .. }))
            .map(|r| r.repo.as_str())
            .collect()
    }

    /// Summary of `repo`, if it completed.
    pub fn summary(&self, repo: &str) -> Option<&RepoSummary> {
        self.repos
            .iter()
            .find(|r| r.repo == repo)
            .and_then(|r| match &r.outcome {
                RepoOutcome::Completed(summary) => Some(summary),
                RepoOutcome::Failed { .. } => None,
            })
    }

    /// Builds submitted across all repositories.
    pub fn total_dispatched(&self) -> usize {
        self.repos
            .iter()
            .filter_map(|r| match &r.outcome {
                RepoOutcome::Completed(summary) => Some(summary.dispatched.len()),
                RepoOutcome::Failed { .. } => None,
            })
            .sum()
    }
}
