pub mod config;
pub mod jenkins;
pub mod metrics;
pub mod orchestrator;
pub mod patchwork;
pub mod state;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, resolve_repos, validate_config, Config, ConfigError,
    RepoConfig, RepoSet, SanitizedConfig, StateBackend,
};
pub use jenkins::{
    build_request, BuildParameters, BuildSubmission, BuildTrigger, DispatchError, JenkinsClient,
    LoggingTrigger, TriggerError,
};
pub use orchestrator::{IngestOrchestrator, OrchestratorError, RepoOutcome, RunReport};
pub use patchwork::{Patch, PatchTracker, PatchworkClient, PatchworkError, Series};
pub use state::{
    open_state_store, read_state_snapshot, JsonFileStateStore, MemoryStateStore, SqliteStateStore, StateDocument,
    StateError, StateStore,
};
