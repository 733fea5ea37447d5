//! Ingestion orchestrator.
//!
//! Drives every configured repository through one ingestion run:
//! - **Recheck**: series left incomplete by earlier runs are looked up again
//!   and dispatched once Patchwork has all their patches
//! - **Discovery**: series newer than the watermark are listed, the
//!   watermark is advanced and incomplete ones are queued for recheck
//! - **Dispatch**: each complete series triggers exactly one build attempt
//!
//! Repositories are processed one after another and every state change is
//! persisted as soon as it is made.

mod runner;
mod types;

pub use runner::IngestOrchestrator;
pub use types::{OrchestratorError, RepoOutcome, RepoReport, RepoSummary, RunReport};
