//! Jenkins build dispatch.
//!
//! This module turns a completed Patchwork series into the parameters of a
//! parameterized Jenkins pipeline build and provides a `BuildTrigger` trait
//! for submitting them.

mod client;
mod dry_run;
mod params;

pub use client::{build_trigger_url, JenkinsClient, JOB_OWNER_FIELD};
pub use dry_run::LoggingTrigger;
pub use params::{build_request, normalize_patch_url, BuildParameters, DispatchError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when submitting a build.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Connection failure, timeout or other transport problem.
    #[error("Jenkins transport error: {0}")]
    Transport(String),

    /// Jenkins refused the build.
    #[error("Jenkins rejected build: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Client could not be created.
    #[error("Jenkins client not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for TriggerError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the trigger token in its query string.
        let e = e.without_url();
        if e.is_timeout() {
            TriggerError::Transport(format!("request timed out: {}", e))
        } else {
            TriggerError::Transport(e.to_string())
        }
    }
}

/// Outcome of an accepted build submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSubmission {
    /// HTTP status Jenkins answered with (usually 201).
    pub status: u16,
    /// Queue item URL from the `Location` header, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_url: Option<String>,
}

/// Trait for build-trigger backends.
#[async_trait]
pub trait BuildTrigger: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Submit one build. `cause` is recorded by Jenkins for audit trails.
    async fn submit_build(
        &self,
        params: &BuildParameters,
        cause: Option<&str>,
    ) -> Result<BuildSubmission, TriggerError>;
}
