//! Mock build trigger for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::jenkins::{BuildParameters, BuildSubmission, BuildTrigger, TriggerError};

/// A recorded build submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedBuild {
    pub params: BuildParameters,
    pub cause: Option<String>,
    /// Whether the mock accepted the build.
    pub accepted: bool,
}

/// Mock implementation of the BuildTrigger trait.
///
/// Records every submission (accepted or not) and fails the next calls
/// with queued errors.
#[derive(Default)]
pub struct MockBuildTrigger {
    submissions: Arc<RwLock<Vec<RecordedBuild>>>,
    queued_errors: Arc<RwLock<VecDeque<TriggerError>>>,
}

impl MockBuildTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next submission.
    pub async fn fail_next(&self, error: TriggerError) {
        self.queued_errors.write().await.push_back(error);
    }

    /// All submissions, in order.
    pub async fn submissions(&self) -> Vec<RecordedBuild> {
        self.submissions.read().await.clone()
    }

    /// Display names of accepted builds, in order.
    pub async fn accepted_display_names(&self) -> Vec<String> {
        self.submissions
            .read()
            .await
            .iter()
            .filter(|b| b.accepted)
            .map(|b| b.params.display_name.clone())
            .collect()
    }

    /// Number of submissions attempted.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl BuildTrigger for MockBuildTrigger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit_build(
        &self,
        params: &BuildParameters,
        cause: Option<&str>,
    ) -> Result<BuildSubmission, TriggerError> {
        let error = self.queued_errors.write().await.pop_front();
        let accepted = error.is_none();

        let mut submissions = self.submissions.write().await;
        submissions.push(RecordedBuild {
            params: params.clone(),
            cause: cause.map(str::to_string),
            accepted,
        });

        match error {
            Some(err) => Err(err),
            None => Ok(BuildSubmission {
                status: 201,
                queue_url: Some(format!("http://jenkins.test/queue/item/{}/", submissions.len())),
            }),
        }
    }
}
