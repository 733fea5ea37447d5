//! Patchwork REST API client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::PatchworkConfig;
use crate::metrics;

use super::{PatchTracker, PatchworkError, Series};

/// Patchwork API client.
///
/// One client serves every configured repository; the instance URL is
/// passed per call.
pub struct PatchworkClient {
    client: Client,
}

impl PatchworkClient {
    /// Create a new Patchwork client.
    pub fn new(config: &PatchworkConfig) -> Result<Self, PatchworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self { client })
    }

    /// Fetch one page of the newest-first series listing.
    ///
    /// Returns `None` when Patchwork reports the page does not exist, which
    /// it does once the listing is exhausted.
    async fn fetch_page(
        &self,
        base_url: &str,
        project: &str,
        page: u32,
    ) -> Result<Option<Vec<Series>>, PatchworkError> {
        let url = format!("{}/api/series", base_url.trim_end_matches('/'));

        debug!(project = project, page = page, "Fetching Patchwork series page");

        let start = Instant::now();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("project", project.to_string()),
                ("order", "-id".to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await;
        metrics::observe_external_request("patchwork", "list_series", start);
        let response = response?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && page > 1 {
            debug!(project = project, page = page, "Past the last page");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PatchworkError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let series: Vec<Series> = response.json().await.map_err(|e| {
            PatchworkError::Parse(format!("Failed to parse series page {}: {}", page, e))
        })?;

        Ok(Some(series))
    }
}

#[async_trait]
impl PatchTracker for PatchworkClient {
    async fn list_series(
        &self,
        base_url: &str,
        project: &str,
        watermark: u64,
    ) -> Result<Vec<Series>, PatchworkError> {
        let mut series_list: Vec<Series> = Vec::new();
        let mut page = 1;

        loop {
            let batch = match self.fetch_page(base_url, project, page).await? {
                Some(batch) if !batch.is_empty() => batch,
                _ => break,
            };

            for series in batch {
                // Listing is newest first: everything from here on was
                // already seen on a previous run.
                if series.id <= watermark {
                    debug!(
                        project = project,
                        series_id = series.id,
                        watermark = watermark,
                        "Reached watermark"
                    );
                    return Ok(series_list);
                }

                // Ids must keep decreasing; a server ignoring `page` would
                // otherwise be paged forever.
                if let Some(last) = series_list.last() {
                    if series.id >= last.id {
                        warn!(
                            project = project,
                            page = page,
                            series_id = series.id,
                            previous_id = last.id,
                            "Series listing is not in descending id order, stopping"
                        );
                        return Ok(series_list);
                    }
                }
                series_list.push(series);
            }

            if watermark == 0 {
                break;
            }
            page += 1;
        }

        Ok(series_list)
    }

    async fn get_series(&self, base_url: &str, series_id: u64) -> Result<Series, PatchworkError> {
        let url = format!("{}/api/series/{}", base_url.trim_end_matches('/'), series_id);

        debug!(series_id = series_id, "Fetching Patchwork series");

        let start = Instant::now();
        let response = self.client.get(&url).send().await;
        metrics::observe_external_request("patchwork", "get_series", start);
        let response = response?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PatchworkError::NotFound(series_id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PatchworkError::Http {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        response.json().await.map_err(|e| {
            PatchworkError::Parse(format!("Failed to parse series {}: {}", series_id, e))
        })
    }
}
