use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Config type whose build configuration is fetched from `config_url`.
pub const CONFIG_TYPE_URL: &str = "url";

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub jenkins: JenkinsConfig,
    #[serde(default)]
    pub patchwork: PatchworkConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Tracked repository sections, keyed by repository name.
    ///
    /// Kept untyped here so one broken section cannot fail the whole load;
    /// `resolve_repos` turns each into a `RepoConfig` or a per-repository
    /// error.
    #[serde(default)]
    pub repos: BTreeMap<String, toml::Value>,
}

/// Jenkins build-trigger endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JenkinsConfig {
    /// Jenkins server URL (e.g., "https://jenkins.example.com")
    pub url: String,
    /// Pipeline job name
    pub pipeline: String,
    /// Remote build trigger token
    pub token: String,
    /// Operator identity injected into every build as `BEAKER_JOB_OWNER`
    pub job_owner: String,
    /// Build description query parameter
    #[serde(default = "default_description")]
    pub description: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_jenkins_timeout")]
    pub timeout_secs: u32,
    /// Verify the Jenkins TLS certificate. Off by default: the endpoint is
    /// an internal host with a self-signed certificate.
    #[serde(default)]
    pub verify_tls: bool,
}

fn default_description() -> String {
    "test".to_string()
}

fn default_jenkins_timeout() -> u32 {
    60
}

/// Patchwork client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchworkConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_patchwork_timeout")]
    pub timeout_secs: u32,
}

impl Default for PatchworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_patchwork_timeout(),
        }
    }
}

fn default_patchwork_timeout() -> u32 {
    30
}

/// State persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackend,
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

/// Available state backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// Whole JSON document in a single file
    #[default]
    File,
    /// Whole JSON document in a single SQLite row
    Sqlite,
}

/// Metrics export configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Path of a node_exporter textfile to write at the end of each run
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

/// A tracked source repository
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RepoConfig {
    /// Patchwork server URL (e.g., "https://patchwork.kernel.org")
    pub patchwork_url: String,
    /// Patchwork project identifier (link name or numeric id)
    pub patchwork_project: String,
    /// Git URL of the tree patches apply to
    pub repo_url: String,
    /// Branch or ref of the tree
    pub repo_branch: String,
    /// Kernel config source ("url" or a builder-side config type)
    pub config_type: String,
    /// Kernel config URL (required when config_type = "url")
    #[serde(default)]
    pub config_url: Option<String>,
    /// Architectures to build, passed to the job verbatim
    pub build_arches: String,
    /// Builder OS label, passed to the job verbatim
    pub builder_os: String,
}

impl RepoConfig {
    /// The config URL to hand to the build, only when the config source is a URL.
    pub fn effective_config_url(&self) -> Option<&str> {
        if self.config_type == CONFIG_TYPE_URL {
            self.config_url.as_deref()
        } else {
            None
        }
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub jenkins: SanitizedJenkinsConfig,
    pub patchwork: PatchworkConfig,
    pub state: StateConfig,
    pub metrics: MetricsConfig,
    pub repos: BTreeMap<String, toml::Value>,
}

/// Sanitized Jenkins config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJenkinsConfig {
    pub url: String,
    pub pipeline: String,
    pub token_configured: bool,
    pub job_owner: String,
    pub timeout_secs: u32,
    pub verify_tls: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            jenkins: SanitizedJenkinsConfig {
                url: config.jenkins.url.clone(),
                pipeline: config.jenkins.pipeline.clone(),
                token_configured: !config.jenkins.token.is_empty(),
                job_owner: config.jenkins.job_owner.clone(),
                timeout_secs: config.jenkins.timeout_secs,
                verify_tls: config.jenkins.verify_tls,
            },
            patchwork: config.patchwork.clone(),
            state: config.state.clone(),
            metrics: config.metrics.clone(),
            repos: config.repos.clone(),
        }
    }
}
