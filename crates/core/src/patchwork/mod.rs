//! Patchwork integration.
//!
//! This module provides a `PatchTracker` trait over the Patchwork REST API
//! (paginated series listing plus single-series lookup), the wire types it
//! returns, and the ordering used to present a series' patches to a build.

mod client;
pub mod ordering;
mod types;

pub use client::PatchworkClient;
pub use ordering::{extract_ordinal, sort_patches};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to Patchwork.
#[derive(Debug, Error)]
pub enum PatchworkError {
    /// Connection failure, timeout or other transport problem.
    #[error("Patchwork transport error: {0}")]
    Transport(String),

    /// Patchwork answered with a non-success status.
    #[error("Patchwork API error: HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The series does not exist (404).
    #[error("Series {0} not found")]
    NotFound(u64),

    /// Failed to parse response.
    #[error("Failed to parse Patchwork response: {0}")]
    Parse(String),
}

impl PatchworkError {
    /// Whether the error means the series is gone rather than unreachable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PatchworkError::NotFound(_))
    }
}

impl From<reqwest::Error> for PatchworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PatchworkError::Transport(format!("request timed out: {}", e))
        } else if e.is_decode() {
            PatchworkError::Parse(e.to_string())
        } else {
            PatchworkError::Transport(e.to_string())
        }
    }
}

/// Trait for patch-tracking backends.
#[async_trait]
pub trait PatchTracker: Send + Sync {
    /// All series of `project` with an id strictly greater than `watermark`,
    /// newest first, complete or not.
    ///
    /// A watermark of 0 means the project has never been seen: only the
    /// first page is fetched so a new project does not backfill its history.
    async fn list_series(
        &self,
        base_url: &str,
        project: &str,
        watermark: u64,
    ) -> Result<Vec<Series>, PatchworkError>;

    /// Fetch a single series by id.
    async fn get_series(&self, base_url: &str, series_id: u64) -> Result<Series, PatchworkError>;
}
