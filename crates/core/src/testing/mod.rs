//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service
//! traits, allowing multi-run ingestion scenarios to be tested without a
//! Patchwork or Jenkins instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use patchwork_ci_core::testing::{fixtures, MockBuildTrigger, MockPatchTracker};
//!
//! let tracker = MockPatchTracker::new();
//! let trigger = MockBuildTrigger::new();
//!
//! tracker.add_series("rhel8", fixtures::series(101, true, 3)).await;
//! tracker.add_series("rhel8", fixtures::series(102, false, 2)).await;
//!
//! // Run the orchestrator, then inspect trigger.submissions().await
//! ```

mod mock_build_trigger;
mod mock_patch_tracker;

pub use mock_build_trigger::{MockBuildTrigger, RecordedBuild};
pub use mock_patch_tracker::{MockPatchTracker, RecordedTrackerCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::config::RepoConfig;
    use crate::patchwork::{Patch, Series};

    /// Patchwork URL used by fixture repositories.
    pub const PATCHWORK_URL: &str = "http://patchwork.test";

    /// Create a patch with the given subject and mbox link.
    pub fn patch(name: &str, mbox: &str) -> Patch {
        Patch {
            id: None,
            name: name.to_string(),
            mbox: mbox.to_string(),
        }
    }

    /// Create a series of `patches` patches, listed in reverse order the
    /// way a slow mail delivery would leave them.
    pub fn series(id: u64, received_all: bool, patches: u32) -> Series {
        Series {
            id,
            name: Some(format!("series {}", id)),
            received_all,
            url: format!("{}/api/series/{}/", PATCHWORK_URL, id),
            patches: (1..=patches)
                .rev()
                .map(|i| Patch {
                    id: Some(id * 100 + i as u64),
                    name: format!("[PATCH {}/{}] change {}", i, patches, i),
                    mbox: format!("{}/patch/{}/mbox/", PATCHWORK_URL, id * 100 + i as u64),
                })
                .collect(),
        }
    }

    /// Create a repository config for a Patchwork project.
    pub fn repo_config(project: &str) -> RepoConfig {
        RepoConfig {
            patchwork_url: PATCHWORK_URL.to_string(),
            patchwork_project: project.to_string(),
            repo_url: format!("git://git.test/{}.git", project),
            repo_branch: "main".to_string(),
            config_type: "url".to_string(),
            config_url: Some(format!("http://configs.test/{}.config", project)),
            build_arches: "x86_64 aarch64".to_string(),
            builder_os: "fedora".to_string(),
        }
    }

    /// Repository map where each repository is named after its project.
    pub fn repos(projects: &[&str]) -> BTreeMap<String, RepoConfig> {
        projects
            .iter()
            .map(|p| (p.to_string(), repo_config(p)))
            .collect()
    }
}
