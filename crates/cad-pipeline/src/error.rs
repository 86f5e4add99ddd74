use std::io;
use std::path::PathBuf;

use cad_script::{ScriptError, ValidationIssue};
use thiserror::Error;

/// Failure of a single sandbox run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("no 3D solid to export (bindings: {})", list_names(.available))]
    NoResultObject { available: Vec<String> },
    #[error("'model' is a {kind}, not an exportable 3D solid")]
    ResultNotExportable { kind: &'static str },
    #[error("model extent of {extent:.1} mm exceeds the {limit:.0} mm limit")]
    ModelTooLarge { extent: f64, limit: f64 },
    #[error("exported mesh is empty")]
    EmptyArtifact,
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn list_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("user '{user_id}' has reached the limit of {limit} models")]
    QuotaExceeded { user_id: String, limit: u32 },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("artifact {} is missing or empty", .path.display())]
    MissingArtifact { path: PathBuf },
    #[error("execution task failed: {0}")]
    Task(String),
}

/// Everything the orchestrator can reject a request with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error("script validation failed: {0}")]
    ScriptValidation(ValidationIssue),
    #[error("script execution failed: {0}")]
    ScriptExecution(ExecutionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Whether the caller caused the rejection. Storage failures are the
    /// only fatal kind.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PipelineError::Storage(_))
    }
}

impl From<ExecutionError> for PipelineError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Io { path, source } => {
                PipelineError::Storage(StorageError::Write { path, source })
            }
            other => PipelineError::ScriptExecution(other),
        }
    }
}
