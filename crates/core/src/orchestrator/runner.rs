//! Ingestion orchestrator implementation.
//!
//! Per series the orchestrator tracks `unseen -> incomplete -> dispatched`
//! or `unseen -> dispatched`. `dispatched` is terminal: a series leaves the
//! pending set the run it is dispatched and its id is at or below the
//! watermark, so neither phase can pick it up again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RepoConfig;
use crate::jenkins::{build_request, BuildTrigger};
use crate::metrics;
use crate::patchwork::{PatchTracker, Series};
use crate::state::{StateDocument, StateError, StateStore};

use super::types::{OrchestratorError, RepoOutcome, RepoReport, RepoSummary, RunReport};

/// The ingestion orchestrator - decides what to recheck, dispatch and persist.
pub struct IngestOrchestrator {
    repos: BTreeMap<String, RepoConfig>,
    /// Repositories whose configuration was refused, with the reason.
    rejected: BTreeMap<String, String>,
    tracker: Arc<dyn PatchTracker>,
    trigger: Arc<dyn BuildTrigger>,
    store: Arc<dyn StateStore>,
}

impl IngestOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        repos: BTreeMap<String, RepoConfig>,
        tracker: Arc<dyn PatchTracker>,
        trigger: Arc<dyn BuildTrigger>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            repos,
            rejected: BTreeMap::new(),
            tracker,
            trigger,
            store,
        }
    }

    /// Report these repositories as failed on every run without touching
    /// their state.
    pub fn with_rejected_repos(mut self, rejected: BTreeMap<String, String>) -> Self {
        self.rejected = rejected;
        self
    }

    /// Load the state document from the store and run every repository.
    ///
    /// Only a document that cannot be loaded is an error; per-repository
    /// failures are reported in the returned `RunReport`.
    pub async fn run_once(&self) -> Result<RunReport, StateError> {
        let mut state = self.store.load()?;
        Ok(self.run(&mut state).await)
    }

    /// Run every configured repository against `state`, in name order.
    pub async fn run(&self, state: &mut StateDocument) -> RunReport {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            repos = self.repos.len(),
            rejected = self.rejected.len(),
            trigger = self.trigger.name(),
            store = self.store.name(),
            "Starting ingestion run"
        );

        let mut report = RunReport::default();

        let names: BTreeSet<&String> = self.repos.keys().chain(self.rejected.keys()).collect();

        for name in names {
            let Some(repo) = self.repos.get(name) else {
                let reason = self.rejected.get(name).cloned().unwrap_or_default();
                metrics::REPO_RUNS
                    .with_label_values(&[name.as_str(), "failed"])
                    .inc();
                error!(repo = %name, error = %reason, "Repository configuration rejected");
                report.repos.push(RepoReport {
                    repo: name.clone(),
                    outcome: RepoOutcome::Failed { error: reason },
                });
                continue;
            };

            let span = info_span!("repo", repo = %name);
            let outcome = match self.process_repo(name, repo, state).instrument(span).await {
                Ok(summary) => {
                    metrics::REPO_RUNS
                        .with_label_values(&[name.as_str(), "ok"])
                        .inc();
                    info!(
                        repo = %name,
                        dispatched = summary.dispatched.len(),
                        pending = summary.pending,
                        watermark = summary.watermark,
                        "Repository done"
                    );
                    RepoOutcome::Completed(summary)
                }
                Err(e) => {
                    metrics::REPO_RUNS
                        .with_label_values(&[name.as_str(), "failed"])
                        .inc();
                    error!(repo = %name, error = %e, "Repository run aborted");
                    RepoOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.repos.push(RepoReport {
                repo: name.clone(),
                outcome,
            });
        }

        info!(
            run_id = %run_id,
            dispatched = report.total_dispatched(),
            failed_repos = report.failed_repos().len(),
            "Ingestion run finished"
        );

        report
    }

    /// Run one repository: ensure state, recheck pending series, discover
    /// new ones, dispatch the complete ones.
    pub async fn process_repo(
        &self,
        name: &str,
        repo: &RepoConfig,
        state: &mut StateDocument,
    ) -> Result<RepoSummary, OrchestratorError> {
        let mut summary = RepoSummary::default();

        if state.ensure_repo(name) {
            info!("First run for repository, creating state entry");
            self.persist(state)?;
        }

        let rechecked = self.recheck_pending(name, repo, state, &mut summary).await?;
        self.discover(name, repo, state, &rechecked, &mut summary).await?;

        if let Some(repo_state) = state.repo(name) {
            summary.watermark = repo_state.last_series_seen;
            summary.pending = repo_state.incomplete_series.len();
        }

        Ok(summary)
    }

    /// Look up every pending series again. Returns the ids that left the
    /// pending set during this phase.
    async fn recheck_pending(
        &self,
        name: &str,
        repo: &RepoConfig,
        state: &mut StateDocument,
        summary: &mut RepoSummary,
    ) -> Result<BTreeSet<u64>, OrchestratorError> {
        let pending: Vec<u64> = state
            .repo(name)
            .map(|r| r.incomplete_series.iter().copied().collect())
            .unwrap_or_default();

        let mut resolved = BTreeSet::new();
        if pending.is_empty() {
            return Ok(resolved);
        }

        debug!(pending = pending.len(), "Rechecking incomplete series");

        for series_id in pending {
            summary.rechecked += 1;

            match self.tracker.get_series(&repo.patchwork_url, series_id).await {
                Ok(series) if series.received_all => {
                    metrics::RECHECKS.with_label_values(&[name, "complete"]).inc();
                    info!(series_id = series_id, "Incomplete series is now complete");

                    // At most once: the id leaves the pending set whatever
                    // the submission outcome.
                    self.dispatch(name, repo, &series, summary).await;
                    state.repo_mut(name).resolve(series_id);
                    resolved.insert(series_id);
                    self.persist(state)?;
                }
                Ok(_) => {
                    metrics::RECHECKS.with_label_values(&[name, "incomplete"]).inc();
                    debug!(series_id = series_id, "Series still incomplete");
                }
                Err(e) if e.is_not_found() => {
                    metrics::RECHECKS.with_label_values(&[name, "not_found"]).inc();
                    warn!(
                        series_id = series_id,
                        "Pending series no longer exists on Patchwork, dropping it"
                    );
                    state.repo_mut(name).resolve(series_id);
                    resolved.insert(series_id);
                    summary.dropped.push(series_id);
                    self.persist(state)?;
                }
                Err(e) => {
                    metrics::RECHECKS.with_label_values(&[name, "error"]).inc();
                    warn!(
                        series_id = series_id,
                        error = %e,
                        "Recheck failed, will retry on the next run"
                    );
                    summary.recheck_errors += 1;
                }
            }
        }

        Ok(resolved)
    }

    /// List series above the watermark, record them, dispatch complete ones.
    async fn discover(
        &self,
        name: &str,
        repo: &RepoConfig,
        state: &mut StateDocument,
        already_handled: &BTreeSet<u64>,
        summary: &mut RepoSummary,
    ) -> Result<(), OrchestratorError> {
        let watermark = state.watermark(name);

        let discovered = self
            .tracker
            .list_series(&repo.patchwork_url, &repo.patchwork_project, watermark)
            .await
            .map_err(OrchestratorError::Discovery)?;

        summary.discovered = discovered.len();
        let Some(newest) = discovered.iter().map(|s| s.id).max() else {
            debug!(watermark = watermark, "No new series");
            return Ok(());
        };

        info!(
            discovered = discovered.len(),
            watermark = watermark,
            newest = newest,
            "Discovered new series"
        );

        // Watermark and newly incomplete ids are saved together, before any
        // dispatch, so a crash cannot lose a series that is now below the
        // watermark.
        {
            let repo_state = state.repo_mut(name);
            repo_state.advance_watermark(newest);

            for series in discovered.iter().filter(|s| !s.received_all) {
                metrics::SERIES_DISCOVERED
                    .with_label_values(&[name, "incomplete"])
                    .inc();
                if already_handled.contains(&series.id) {
                    continue;
                }
                if repo_state.mark_incomplete(series.id) {
                    info!(
                        series_id = series.id,
                        "Series incomplete, will recheck on a later run"
                    );
                    summary.newly_incomplete.push(series.id);
                }
            }
        }
        self.persist(state)?;

        for series in discovered.iter().filter(|s| s.received_all) {
            metrics::SERIES_DISCOVERED
                .with_label_values(&[name, "complete"])
                .inc();

            if already_handled.contains(&series.id) {
                debug!(series_id = series.id, "Series already handled by recheck");
                continue;
            }

            self.dispatch(name, repo, series, summary).await;

            // A complete series that somehow sits in the pending set would
            // otherwise be dispatched again by the next recheck.
            if state.repo_mut(name).resolve(series.id) {
                self.persist(state)?;
            }
        }

        Ok(())
    }

    /// Build and submit one complete series. Failures are logged and
    /// recorded in the summary, never retried.
    async fn dispatch(
        &self,
        name: &str,
        repo: &RepoConfig,
        series: &Series,
        summary: &mut RepoSummary,
    ) {
        let params = match build_request(repo, series) {
            Ok(params) => params,
            Err(e) => {
                metrics::DISPATCHES.with_label_values(&[name, "malformed"]).inc();
                warn!(series_id = series.id, error = %e, "Skipping malformed series");
                summary.malformed.push(series.id);
                return;
            }
        };

        let cause = Some(series.url.as_str()).filter(|url| !url.is_empty());

        match self.trigger.submit_build(&params, cause).await {
            Ok(submission) => {
                metrics::DISPATCHES.with_label_values(&[name, "submitted"]).inc();
                info!(
                    series_id = series.id,
                    display_name = %params.display_name,
                    patches = params.patchwork_urls.len(),
                    queue_url = submission.queue_url.as_deref().unwrap_or(""),
                    "Build submitted"
                );
                summary.dispatched.push(series.id);
            }
            Err(e) => {
                metrics::DISPATCHES.with_label_values(&[name, "failed"]).inc();
                error!(
                    series_id = series.id,
                    display_name = %params.display_name,
                    error = %e,
                    "Build submission failed, series will not be retried"
                );
                summary.dispatch_failures.push(series.id);
            }
        }
    }

    fn persist(&self, state: &StateDocument) -> Result<(), OrchestratorError> {
        self.store.save(state)?;
        Ok(())
    }
}
