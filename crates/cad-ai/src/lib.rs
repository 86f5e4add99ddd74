//! Prompt-to-script generation: a language model backend behind an
//! async trait, the response extractor and the deterministic keyword
//! fallback used whenever the model cannot deliver a valid script.

use std::time::Duration;

use async_trait::async_trait;
use cad_script::ValidationIssue;
use thiserror::Error;

pub mod extract;
pub mod fallback;
mod gemini;
mod generator;
mod prompt;

pub use extract::{clean_script, extract_script};
pub use fallback::{FALLBACK_CATALOG, FallbackCategory, matched_category, synthesize};
pub use gemini::GeminiClient;
pub use generator::{GeneratedScript, GeneratorConfig, ScriptGenerator, ScriptStrategy};
pub use prompt::{DEFAULT_SYSTEM_PROMPT, FEW_SHOT_EXAMPLES, FewShotExample, user_message};

/// Everything a backend needs for one completion.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub examples: &'a [FewShotExample],
    pub user_prompt: &'a str,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("no API key configured for the language model backend")]
    MissingCredentials,
    #[error("language model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("language model quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("language model permission denied: {0}")]
    PermissionDenied(String),
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl BackendError {
    /// Maps a raw backend error message onto the taxonomy by substring.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("RESOURCE_EXHAUSTED") || message.to_lowercase().contains("quota") {
            BackendError::QuotaExhausted(message)
        } else if message.contains("PERMISSION_DENIED") {
            BackendError::PermissionDenied(message)
        } else {
            BackendError::Backend(message)
        }
    }

    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::MissingCredentials => "missing_credentials",
            BackendError::Timeout(_) => "timeout",
            BackendError::QuotaExhausted(_) => "quota_exhausted",
            BackendError::PermissionDenied(_) => "permission_denied",
            BackendError::EmptyResponse => "empty_response",
            BackendError::Transport(_) => "transport",
            BackendError::Backend(_) => "backend",
        }
    }
}

/// Why the AI tier did not produce a usable script. Never surfaced to
/// callers; the generator absorbs it and falls back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("no script found in model response")]
    Extraction,
    #[error("generated script failed validation: {0}")]
    Validation(#[from] ValidationIssue),
}

impl GenerationFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationFailure::Backend(err) => err.kind(),
            GenerationFailure::Extraction => "extraction",
            GenerationFailure::Validation(_) => "validation",
        }
    }
}
