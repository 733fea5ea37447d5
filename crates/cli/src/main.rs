use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use patchwork_ci_core::{
    load_config, metrics, open_state_store, read_state_snapshot, resolve_repos, validate_config,
    BuildTrigger, IngestOrchestrator, JenkinsClient, LoggingTrigger, MemoryStateStore,
    PatchTracker, PatchworkClient, RunReport, SanitizedConfig, StateStore,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when at least one repository failed.
const EXIT_REPO_FAILED: u8 = 2;

/// Exit status when the run could not start.
const EXIT_STARTUP_FAILED: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Send newly completed Patchwork series to Jenkins as pipeline builds.
#[derive(Debug, Parser)]
#[command(name = "enqueue-jobs", version)]
struct Args {
    /// Configuration file
    #[arg(long, env = "PATCHWORK_CI_CONFIG", default_value = "config.toml")]
    config_file: PathBuf,

    /// State location, overriding `state.path` from the configuration
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log the builds that would be sent and leave the state untouched
    #[arg(long)]
    dry_run: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_format);

    match run(args).await {
        Ok(report) => ExitCode::from(exit_status(&report)),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::from(EXIT_STARTUP_FAILED)
        }
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

fn exit_status(report: &RunReport) -> u8 {
    if report.failed_repos().is_empty() {
        0
    } else {
        EXIT_REPO_FAILED
    }
}

async fn run(args: Args) -> Result<RunReport> {
    info!(version = VERSION, "Starting enqueue-jobs");

    info!("Loading configuration from {:?}", args.config_file);
    let config = load_config(&args.config_file)
        .with_context(|| format!("Failed to load config from {:?}", args.config_file))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        repos = config.repos.len(),
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    debug!(config = %config_json, "Effective configuration");

    let repos = resolve_repos(&config);
    for (name, e) in &repos.rejected {
        error!(repo = %name, error = %e, "Repository configuration rejected");
    }
    let rejected = repos
        .rejected
        .iter()
        .map(|(name, e)| (name.clone(), e.to_string()))
        .collect();

    let state_path = args
        .state_file
        .clone()
        .unwrap_or_else(|| config.state.path.clone());

    let tracker: Arc<dyn PatchTracker> = Arc::new(
        PatchworkClient::new(&config.patchwork).context("Failed to create Patchwork client")?,
    );

    let (trigger, store): (Arc<dyn BuildTrigger>, Arc<dyn StateStore>) = if args.dry_run {
        let document = read_state_snapshot(config.state.backend, &state_path)
            .with_context(|| format!("Failed to read state at {:?}", state_path))?;
        info!("Dry run: no builds will be submitted and state will not be saved");
        (
            Arc::new(LoggingTrigger::new()),
            Arc::new(MemoryStateStore::seeded(document)),
        )
    } else {
        let store: Arc<dyn StateStore> = Arc::from(
            open_state_store(config.state.backend, &state_path)
                .with_context(|| format!("Failed to open state at {:?}", state_path))?,
        );
        info!(backend = store.name(), path = ?state_path, "State store opened");
        let jenkins = JenkinsClient::new(config.jenkins.clone())
            .context("Failed to create Jenkins client")?;
        (Arc::new(jenkins), store)
    };

    let orchestrator = IngestOrchestrator::new(repos.valid, tracker, trigger, store)
        .with_rejected_repos(rejected);
    let report = orchestrator.run_once().await.context("Failed to load state")?;

    for failed in report.failed_repos() {
        warn!(repo = failed, "Repository did not complete");
    }

    if let Some(path) = config.metrics.textfile.as_ref().filter(|_| !args.dry_run) {
        match metrics::write_textfile(path) {
            Ok(()) => debug!(path = ?path, "Metrics written"),
            Err(e) => warn!(path = ?path, error = %e, "Failed to write metrics textfile"),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchwork_ci_core::orchestrator::{RepoOutcome, RepoReport, RepoSummary};

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["enqueue-jobs"]).unwrap();
        assert!(!args.dry_run);
        assert!(args.state_file.is_none());
        assert_eq!(args.log_format, LogFormat::Text);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "enqueue-jobs",
            "--config-file",
            "/etc/patchwork-ci/config.toml",
            "--state-file",
            "/var/lib/patchwork-ci/state.json",
            "--dry-run",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.config_file, PathBuf::from("/etc/patchwork-ci/config.toml"));
        assert_eq!(
            args.state_file,
            Some(PathBuf::from("/var/lib/patchwork-ci/state.json"))
        );
        assert!(args.dry_run);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn test_exit_status() {
        let mut report = RunReport::default();
        report.repos.push(RepoReport {
            repo: "rhel8".to_string(),
            outcome: RepoOutcome::Completed(RepoSummary::default()),
        });
        assert_eq!(exit_status(&report), 0);

        report.repos.push(RepoReport {
            repo: "fedora".to_string(),
            outcome: RepoOutcome::Failed {
                error: "Patchwork API error: HTTP 502: Bad Gateway".to_string(),
            },
        });
        assert_eq!(exit_status(&report), EXIT_REPO_FAILED);
    }

    #[tokio::test]
    async fn test_missing_config_is_startup_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = Args {
            config_file: dir.path().join("missing.toml"),
            state_file: None,
            dry_run: true,
            log_format: LogFormat::Text,
        };

        let err = run(args).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Configuration file not found"));
    }

    /// A Patchwork URL nothing listens on: discovery fails and the
    /// repository is reported, but the run itself completes.
    fn closed_patchwork_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        url
    }

    fn dry_run_args(config_file: PathBuf, state_file: PathBuf) -> Args {
        Args {
            config_file,
            state_file: Some(state_file),
            dry_run: true,
            log_format: LogFormat::Text,
        }
    }

    #[tokio::test]
    async fn test_dry_run_leaves_state_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let state_path = dir.path().join("state.json");
        let patchwork = closed_patchwork_url();

        std::fs::write(
            &config_path,
            format!(
                r#"
[jenkins]
url = "https://jenkins.example.com"
pipeline = "kernel-patchwork"
token = "t"
job_owner = "ci@example.com"

[repos.rhel8]
patchwork_url = "{}"
patchwork_project = "rhel8"
repo_url = "git://git.example.com/rhel8.git"
repo_branch = "main"
config_type = "rhel"
build_arches = "x86_64"
builder_os = "rhel8"
"#,
                patchwork
            ),
        )
        .unwrap();
        std::fs::write(
            &state_path,
            "{\n  \"rhel8\": {\n    \"last_series_seen\": 5,\n    \"incomplete_series\": [4]\n  }\n}\n",
        )
        .unwrap();
        let before = std::fs::read(&state_path).unwrap();

        let report = run(dry_run_args(config_path, state_path.clone())).await.unwrap();
        assert_eq!(report.failed_repos(), vec!["rhel8"]);
        assert_eq!(exit_status(&report), EXIT_REPO_FAILED);
        assert_eq!(std::fs::read(&state_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_sqlite_dry_run_creates_no_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let state_path = dir.path().join("state.db");

        std::fs::write(
            &config_path,
            format!(
                r#"
[jenkins]
url = "https://jenkins.example.com"
pipeline = "kernel-patchwork"
token = "t"
job_owner = "ci@example.com"

[state]
backend = "sqlite"

[repos.rhel8]
patchwork_url = "{}"
patchwork_project = "rhel8"
repo_url = "git://git.example.com/rhel8.git"
repo_branch = "main"
config_type = "rhel"
build_arches = "x86_64"
builder_os = "rhel8"
"#,
                closed_patchwork_url()
            ),
        )
        .unwrap();

        let report = run(dry_run_args(config_path, state_path.clone())).await.unwrap();
        assert_eq!(report.failed_repos(), vec!["rhel8"]);
        assert!(!state_path.exists());
    }

    #[tokio::test]
    async fn test_invalid_repo_section_fails_only_that_repo() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let state_path = dir.path().join("state.json");

        std::fs::write(
            &config_path,
            format!(
                r#"
[jenkins]
url = "https://jenkins.example.com"
pipeline = "kernel-patchwork"
token = "t"
job_owner = "ci@example.com"

[repos.rhel8]
patchwork_url = "{}"
patchwork_project = "rhel8"
repo_url = "git://git.example.com/rhel8.git"
repo_branch = "main"
config_type = "rhel"
build_arches = "x86_64"
builder_os = "rhel8"

[repos.broken]
patchwork_url = "https://patchwork.example.com"
patchwork_project = "broken"
"#,
                closed_patchwork_url()
            ),
        )
        .unwrap();

        let report = run(dry_run_args(config_path, state_path)).await.unwrap();

        assert_eq!(report.failed_repos(), vec!["broken", "rhel8"]);
        assert_eq!(exit_status(&report), EXIT_REPO_FAILED);
        let broken = report.repos.iter().find(|r| r.repo == "broken").unwrap();
        match &broken.outcome {
            RepoOutcome::Failed { error } => assert!(error.contains("repos.broken"), "{}", error),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
