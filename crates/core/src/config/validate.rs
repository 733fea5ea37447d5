use std::collections::BTreeMap;

use super::{
    types::{Config, RepoConfig, CONFIG_TYPE_URL},
    ConfigError,
};

/// Repository sections split by whether they can be ingested.
#[derive(Debug, Default)]
pub struct RepoSet {
    pub valid: BTreeMap<String, RepoConfig>,
    pub rejected: BTreeMap<String, ConfigError>,
}

/// Validate the settings every repository shares.
///
/// Repository sections are checked separately by [`resolve_repos`]; a bad
/// one only takes that repository out of the run.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let jenkins = &config.jenkins;
    require_http_url("jenkins.url", &jenkins.url)?;
    require_non_empty("jenkins.pipeline", &jenkins.pipeline)?;
    require_non_empty("jenkins.token", &jenkins.token)?;
    require_non_empty("jenkins.job_owner", &jenkins.job_owner)?;

    if jenkins.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "jenkins.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.patchwork.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "patchwork.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.repos.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one [repos.<name>] section is required".to_string(),
        ));
    }

    Ok(())
}

/// Type-check and validate every repository section.
pub fn resolve_repos(config: &Config) -> RepoSet {
    let mut set = RepoSet::default();
    for (name, value) in &config.repos {
        match parse_repo(name, value) {
            Ok(repo) => {
                set.valid.insert(name.clone(), repo);
            }
            Err(e) => {
                set.rejected.insert(name.clone(), e);
            }
        }
    }
    set
}

/// Turn one raw `[repos.<name>]` section into a validated `RepoConfig`.
pub fn parse_repo(name: &str, value: &toml::Value) -> Result<RepoConfig, ConfigError> {
    let repo: RepoConfig = value
        .clone()
        .try_into()
        .map_err(|e| ConfigError::ValidationError(format!("repos.{}: {}", name, e)))?;
    validate_repo(name, &repo)?;
    Ok(repo)
}

/// Validate a single repository section.
pub fn validate_repo(name: &str, repo: &RepoConfig) -> Result<(), ConfigError> {
    let field = |f: &str| format!("repos.{}.{}", name, f);

    require_http_url(&field("patchwork_url"), &repo.patchwork_url)?;
    require_non_empty(&field("patchwork_project"), &repo.patchwork_project)?;
    require_non_empty(&field("repo_url"), &repo.repo_url)?;
    require_non_empty(&field("repo_branch"), &repo.repo_branch)?;
    require_non_empty(&field("config_type"), &repo.config_type)?;
    require_non_empty(&field("build_arches"), &repo.build_arches)?;
    require_non_empty(&field("builder_os"), &repo.builder_os)?;

    if repo.config_type == CONFIG_TYPE_URL {
        match repo.config_url.as_deref() {
            Some(url) => require_http_url(&field("config_url"), url)?,
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "{} is required when config_type = \"url\"",
                    field("config_url")
                )))
            }
        }
    }

    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

fn require_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    require_non_empty(field, value)?;
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "{} must be an http(s) URL, got {:?}",
            field, value
        )));
    }
    Ok(())
}
