//! Jenkins remote build trigger client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header::LOCATION, Client};
use tracing::{debug, info, warn};

use crate::config::JenkinsConfig;
use crate::metrics;

use super::{BuildParameters, BuildSubmission, BuildTrigger, TriggerError};

/// Form field carrying the operator identity for every build.
pub const JOB_OWNER_FIELD: &str = "BEAKER_JOB_OWNER";

/// Jenkins `buildWithParameters` client.
pub struct JenkinsClient {
    client: Client,
    config: JenkinsConfig,
}

impl JenkinsClient {
    /// Create a new Jenkins client.
    pub fn new(config: JenkinsConfig) -> Result<Self, TriggerError> {
        if !config.verify_tls {
            warn!(
                url = %config.url,
                "TLS certificate verification is disabled for Jenkins (jenkins.verify_tls = false)"
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| TriggerError::NotConfigured(e.to_string()))?;

        Ok(Self { client, config })
    }
}

/// Build the trigger URL for a pipeline, including the query string.
pub fn build_trigger_url(config: &JenkinsConfig, cause: Option<&str>) -> String {
    let mut url = format!(
        "{}/job/{}/buildWithParameters?token={}&description={}",
        config.url.trim_end_matches('/'),
        urlencoding::encode(&config.pipeline),
        urlencoding::encode(&config.token),
        urlencoding::encode(&config.description)
    );

    if let Some(cause) = cause {
        url.push_str(&format!("&cause={}", urlencoding::encode(cause)));
    }

    url
}

#[async_trait]
impl BuildTrigger for JenkinsClient {
    fn name(&self) -> &str {
        "jenkins"
    }

    async fn submit_build(
        &self,
        params: &BuildParameters,
        cause: Option<&str>,
    ) -> Result<BuildSubmission, TriggerError> {
        let url = build_trigger_url(&self.config, cause);

        let mut form = params.to_form();
        form.push((JOB_OWNER_FIELD, self.config.job_owner.clone()));

        info!(
            display_name = %params.display_name,
            pipeline = %self.config.pipeline,
            "Sending job to Jenkins"
        );

        let start = Instant::now();
        let response = self.client.post(&url).form(&form).send().await;
        metrics::observe_external_request("jenkins", "submit_build", start);
        let response = response?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriggerError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let queue_url = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(status = status.as_u16(), queue_url = ?queue_url, "Jenkins accepted build");

        Ok(BuildSubmission {
            status: status.as_u16(),
            queue_url,
        })
    }
}
