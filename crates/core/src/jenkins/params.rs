//! Build parameter assembly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RepoConfig;
use crate::patchwork::{sort_patches, Series};

/// Errors that prevent a series from being turned into a build request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The series record is missing data a build needs.
    #[error("Malformed series {series_id}: {reason}")]
    MalformedSeries { series_id: u64, reason: String },
}

/// Parameters of one pipeline build, rendered as form fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameters {
    pub kernel_repo: String,
    pub kernel_ref: String,
    /// Patch URLs in build order.
    pub patchwork_urls: Vec<String>,
    pub config_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_url: Option<String>,
    pub kernel_build_arches: String,
    pub builder_os: String,
    /// `"<project> | <series id> | <series name>"`
    pub display_name: String,
}

impl BuildParameters {
    /// Form fields in the names the pipeline expects.
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("KERNEL_REPO", self.kernel_repo.clone()),
            ("KERNEL_REF", self.kernel_ref.clone()),
            ("PATCHWORK_URLS", self.patchwork_urls.join(" ")),
            ("CONFIG_TYPE", self.config_type.clone()),
        ];
        if let Some(url) = &self.config_url {
            form.push(("CONFIG_URL", url.clone()));
        }
        form.push(("KERNEL_BUILD_ARCHES", self.kernel_build_arches.clone()));
        form.push(("BUILDER_OS", self.builder_os.clone()));
        form.push(("DISPLAY_NAME", self.display_name.clone()));
        form
    }
}

/// Strip the `/mbox/` segment Patchwork appends to patch download links.
pub fn normalize_patch_url(mbox_url: &str) -> String {
    let trimmed = mbox_url.trim();
    let base = trimmed
        .strip_suffix("/mbox/")
        .or_else(|| trimmed.strip_suffix("/mbox"))
        .unwrap_or(trimmed);
    base.trim_end_matches('/').to_string()
}

/// Assemble the build parameters for a completed series.
///
/// Fails closed on a series without patches or with a patch lacking an
/// mbox link; such a series must never produce a build.
pub fn build_request(repo: &RepoConfig, series: &Series) -> Result<BuildParameters, DispatchError> {
    if series.patches.is_empty() {
        return Err(DispatchError::MalformedSeries {
            series_id: series.id,
            reason: "series has no patches".to_string(),
        });
    }
    if let Some(patch) = series.patches.iter().find(|p| p.mbox.trim().is_empty()) {
        return Err(DispatchError::MalformedSeries {
            series_id: series.id,
            reason: format!("patch {:?} has no mbox URL", patch.name),
        });
    }

    let patchwork_urls = sort_patches(series.patches.clone())
        .iter()
        .map(|p| normalize_patch_url(&p.mbox))
        .collect();

    let display_name = format!(
        "{} | {} | {}",
        repo.patchwork_project,
        series.id,
        series.display_name()
    );

    Ok(BuildParameters {
        kernel_repo: repo.repo_url.clone(),
        kernel_ref: repo.repo_branch.clone(),
        patchwork_urls,
        config_type: repo.config_type.clone(),
        config_url: repo.effective_config_url().map(str::to_string),
        kernel_build_arches: repo.build_arches.clone(),
        builder_os: repo.builder_os.clone(),
        display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patchwork::Patch;

    fn repo(config_type: &str) -> RepoConfig {
        RepoConfig {
            patchwork_url: "http://pw".to_string(),
            patchwork_project: "rhel8".to_string(),
            repo_url: "git://example.com/kernel.git".to_string(),
            repo_branch: "main".to_string(),
            config_type: config_type.to_string(),
            config_url: Some("http://example.com/config".to_string()),
            build_arches: "x86_64 s390x".to_string(),
            builder_os: "fedora".to_string(),
        }
    }

    fn series(patches: Vec<(&str, &str)>) -> Series {
        Series {
            id: 321,
            name: Some("mm: cleanup".to_string()),
            received_all: true,
            url: "http://pw/api/series/321/".to_string(),
            patches: patches
                .into_iter()
                .map(|(name, mbox)| Patch {
                    id: None,
                    name: name.to_string(),
                    mbox: mbox.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_normalize_patch_url() {
        assert_eq!(
            normalize_patch_url("http://pw/patch/123/mbox/"),
            "http://pw/patch/123"
        );
        assert_eq!(normalize_patch_url("http://pw/patch/123/mbox"), "http://pw/patch/123");
        assert_eq!(normalize_patch_url("http://pw/patch/123/"), "http://pw/patch/123");
    }

    #[test]
    fn test_normalize_keeps_trailing_mbox_letters() {
        // Only the whole segment is removed, not trailing characters of the path.
        assert_eq!(
            normalize_patch_url("http://pw/patch/box/mbox/"),
            "http://pw/patch/box"
        );
    }

    #[test]
    fn test_build_request_orders_and_normalizes() {
        let s = series(vec![
            ("[PATCH 2/3] b", "http://pw/patch/2/mbox/"),
            ("[PATCH 1/3] a", "http://pw/patch/1/mbox/"),
            ("[PATCH 3/3] c", "http://pw/patch/3/mbox/"),
        ]);
        let params = build_request(&repo("url"), &s).unwrap();

        assert_eq!(
            params.patchwork_urls,
            vec!["http://pw/patch/1", "http://pw/patch/2", "http://pw/patch/3"]
        );
        assert_eq!(params.display_name, "rhel8 | 321 | mm: cleanup");
        assert_eq!(params.kernel_repo, "git://example.com/kernel.git");
        assert_eq!(params.kernel_ref, "main");
        assert_eq!(params.kernel_build_arches, "x86_64 s390x");
        assert_eq!(params.config_url.as_deref(), Some("http://example.com/config"));
    }

    #[test]
    fn test_build_request_omits_config_url_for_non_url_source() {
        let s = series(vec![("[PATCH] fix", "http://pw/patch/9/mbox/")]);
        let params = build_request(&repo("tinyconfig"), &s).unwrap();
        assert!(params.config_url.is_none());
        assert!(!params.to_form().iter().any(|(k, _)| *k == "CONFIG_URL"));
    }

    #[test]
    fn test_build_request_rejects_empty_series() {
        let s = series(vec![]);
        let err = build_request(&repo("url"), &s).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedSeries { series_id: 321, .. }));
    }

    #[test]
    fn test_build_request_rejects_missing_mbox() {
        let s = series(vec![("[PATCH 1/2] a", "http://pw/patch/1/mbox/"), ("[PATCH 2/2] b", "")]);
        assert!(build_request(&repo("url"), &s).is_err());
    }

    #[test]
    fn test_to_form_fields() {
        let s = series(vec![
            ("[PATCH 2/2] b", "http://pw/patch/2/mbox/"),
            ("[PATCH 1/2] a", "http://pw/patch/1/mbox/"),
        ]);
        let form = build_request(&repo("url"), &s).unwrap().to_form();
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("PATCHWORK_URLS"), Some("http://pw/patch/1 http://pw/patch/2"));
        assert_eq!(get("CONFIG_TYPE"), Some("url"));
        assert_eq!(get("CONFIG_URL"), Some("http://example.com/config"));
        assert_eq!(get("BUILDER_OS"), Some("fedora"));
        assert_eq!(get("DISPLAY_NAME"), Some("rhel8 | 321 | mm: cleanup"));
    }
}
