//! Mock patch tracker for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::patchwork::{PatchTracker, PatchworkError, Series};

/// A recorded tracker call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedTrackerCall {
    ListSeries { project: String, watermark: u64 },
    GetSeries { series_id: u64 },
}

/// Mock implementation of the PatchTracker trait.
///
/// Holds series per project and answers the listing contract directly:
/// newest first, strictly above the watermark, first page only for a
/// watermark of 0. Failures can be injected per project or per series.
pub struct MockPatchTracker {
    /// Series by id, with the project each belongs to.
    series: Arc<RwLock<BTreeMap<u64, (String, Series)>>>,
    /// Series per page for first-run listings.
    page_size: usize,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<RecordedTrackerCall>>>,
    /// One-shot listing failures by project.
    list_errors: Arc<RwLock<HashMap<String, PatchworkError>>>,
    /// One-shot lookup failures by series id.
    get_errors: Arc<RwLock<HashMap<u64, PatchworkError>>>,
}

impl Default for MockPatchTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPatchTracker {
    /// Create an empty tracker with Patchwork's default page size of 30.
    pub fn new() -> Self {
        Self::with_page_size(30)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            series: Arc::new(RwLock::new(BTreeMap::new())),
            page_size,
            calls: Arc::new(RwLock::new(Vec::new())),
            list_errors: Arc::new(RwLock::new(HashMap::new())),
            get_errors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // =========================================================================
    // Series Configuration
    // =========================================================================

    /// Add or replace a series in `project`.
    pub async fn add_series(&self, project: &str, series: Series) {
        self.series
            .write()
            .await
            .insert(series.id, (project.to_string(), series));
    }

    /// Mark a series as having received all its patches.
    pub async fn complete_series(&self, series_id: u64) {
        if let Some((_, series)) = self.series.write().await.get_mut(&series_id) {
            series.received_all = true;
        }
    }

    /// Remove a series, as if it had been deleted upstream.
    pub async fn remove_series(&self, series_id: u64) {
        self.series.write().await.remove(&series_id);
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Make the next listing of `project` fail.
    pub async fn fail_next_list(&self, project: &str, error: PatchworkError) {
        self.list_errors
            .write()
            .await
            .insert(project.to_string(), error);
    }

    /// Make the next lookup of `series_id` fail.
    pub async fn fail_next_get(&self, series_id: u64, error: PatchworkError) {
        self.get_errors.write().await.insert(series_id, error);
    }

    // =========================================================================
    // Call Recording
    // =========================================================================

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedTrackerCall> {
        self.calls.read().await.clone()
    }

    /// Ids looked up with `get_series`, in call order.
    pub async fn lookups(&self) -> Vec<u64> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedTrackerCall::GetSeries { series_id } => Some(*series_id),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }
}

#[async_trait]
impl PatchTracker for MockPatchTracker {
    async fn list_series(
        &self,
        _base_url: &str,
        project: &str,
        watermark: u64,
    ) -> Result<Vec<Series>, PatchworkError> {
        self.calls.write().await.push(RecordedTrackerCall::ListSeries {
            project: project.to_string(),
            watermark,
        });

        if let Some(err) = self.list_errors.write().await.remove(project) {
            return Err(err);
        }

        let series = self.series.read().await;
        let newest_first = series
            .values()
            .rev()
            .filter(|(p, _)| p == project)
            .map(|(_, s)| s);

        let listed: Vec<Series> = if watermark == 0 {
            newest_first.take(self.page_size).cloned().collect()
        } else {
            newest_first
                .take_while(|s| s.id > watermark)
                .cloned()
                .collect()
        };

        Ok(listed)
    }

    async fn get_series(&self, _base_url: &str, series_id: u64) -> Result<Series, PatchworkError> {
        self.calls
            .write()
            .await
            .push(RecordedTrackerCall::GetSeries { series_id });

        if let Some(err) = self.get_errors.write().await.remove(&series_id) {
            return Err(err);
        }

        self.series
            .read()
            .await
            .get(&series_id)
            .map(|(_, s)| s.clone())
            .ok_or(PatchworkError::NotFound(series_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_list_respects_watermark_and_project() {
        let tracker = MockPatchTracker::new();
        for id in [5, 6, 7] {
            tracker.add_series("a", fixtures::series(id, true, 1)).await;
        }
        tracker.add_series("b", fixtures::series(8, true, 1)).await;

        let listed = tracker.list_series("http://pw", "a", 5).await.unwrap();
        let ids: Vec<u64> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![7, 6]);
    }

    #[tokio::test]
    async fn test_first_listing_is_one_page() {
        let tracker = MockPatchTracker::with_page_size(2);
        for id in 1..=5 {
            tracker.add_series("a", fixtures::series(id, true, 1)).await;
        }

        let listed = tracker.list_series("http://pw", "a", 0).await.unwrap();
        let ids: Vec<u64> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[tokio::test]
    async fn test_injected_errors_are_one_shot() {
        let tracker = MockPatchTracker::new();
        tracker.add_series("a", fixtures::series(1, true, 1)).await;
        tracker
            .fail_next_get(1, PatchworkError::Transport("reset".into()))
            .await;

        assert!(tracker.get_series("http://pw", 1).await.is_err());
        assert!(tracker.get_series("http://pw", 1).await.is_ok());
        assert!(tracker
            .get_series("http://pw", 2)
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(tracker.lookups().await, vec![1, 1, 2]);
    }
}
