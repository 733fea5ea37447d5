//! Build trigger that only logs what it would submit.

use async_trait::async_trait;
use tracing::info;

use super::{BuildParameters, BuildSubmission, BuildTrigger, TriggerError};

/// `BuildTrigger` used for dry runs: nothing leaves the process.
#[derive(Debug, Default)]
pub struct LoggingTrigger;

impl LoggingTrigger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildTrigger for LoggingTrigger {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn submit_build(
        &self,
        params: &BuildParameters,
        cause: Option<&str>,
    ) -> Result<BuildSubmission, TriggerError> {
        info!(
            display_name = %params.display_name,
            patches = %params.patchwork_urls.join(" "),
            cause = cause.unwrap_or(""),
            "Dry run: would send job to Jenkins"
        );
        Ok(BuildSubmission {
            status: 0,
            queue_url: None,
        })
    }
}
