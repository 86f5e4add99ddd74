//! Prompt-to-artifact pipeline: quota reservation, script acquisition,
//! sandboxed execution, STL export and artifact registration.

use std::path::{Path, PathBuf};

mod config;
mod error;
mod orchestrator;
mod quota;
mod sandbox;
mod store;

pub use cad_ai::ScriptStrategy;
pub use config::PipelineConfig;
pub use error::{ExecutionError, PipelineError, QuotaError, StorageError};
pub use orchestrator::{
    CALLER_EXECUTION_PLAN, ExecutionStep, GenerationOutcome, GenerationStatus, Orchestrator,
    SCRIPT_STRATEGIES, SYSTEM_EXECUTION_PLAN,
};
pub use quota::{QuotaLedger, QuotaReservation, QuotaSummary, UserModelCount, UserQuota};
pub use sandbox::Sandbox;
pub use store::{ArtifactEntry, ArtifactStore};

/// `<root>/model_<artifact_id>.stl`
pub fn artifact_path(root: &Path, artifact_id: &str) -> PathBuf {
    root.join(format!("model_{artifact_id}.stl"))
}
