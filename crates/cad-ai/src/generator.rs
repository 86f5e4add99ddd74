use std::sync::Arc;
use std::time::Duration;

use cad_script::validate_script;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::extract::extract_script;
use crate::fallback::{matched_category, synthesize};
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, FEW_SHOT_EXAMPLES, user_message};
use crate::{BackendError, CompletionRequest, GenerationFailure, LanguageModel};

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub timeout: Duration,
    pub system_prompt: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Where a script came from, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStrategy {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub script: String,
    pub source: ScriptStrategy,
}

/// Turns prompts into scripts through a [`LanguageModel`], falling back
/// to the keyword synthesizer on any failure.
#[derive(Clone)]
pub struct ScriptGenerator {
    model: Arc<dyn LanguageModel>,
    config: GeneratorConfig,
}

impl ScriptGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, config: GeneratorConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// The AI tier alone: backend call under the timeout, extraction and
    /// validation.
    pub async fn try_generate(&self, prompt: &str) -> Result<String, GenerationFailure> {
        let user_prompt = user_message(prompt);
        let request = CompletionRequest {
            system_prompt: &self.config.system_prompt,
            examples: FEW_SHOT_EXAMPLES,
            user_prompt: &user_prompt,
        };

        let response = timeout(self.config.timeout, self.model.complete(&request))
            .await
            .map_err(|_| BackendError::Timeout(self.config.timeout))??;
        if response.trim().is_empty() {
            return Err(BackendError::EmptyResponse.into());
        }

        let script = extract_script(&response);
        if script.is_empty() {
            return Err(GenerationFailure::Extraction);
        }
        validate_script(&script)?;
        Ok(script)
    }

    /// Never fails: any AI-tier failure is logged and replaced by the
    /// synthesizer's script.
    pub async fn generate(&self, prompt: &str) -> GeneratedScript {
        match self.try_generate(prompt).await {
            Ok(script) => {
                info!(chars = script.len(), "generated script with language model");
                GeneratedScript {
                    script,
                    source: ScriptStrategy::Ai,
                }
            }
            Err(failure) => {
                warn!(
                    kind = failure.kind(),
                    error = %failure,
                    category = matched_category(prompt).name,
                    "language model generation failed, using fallback script"
                );
                GeneratedScript {
                    script: synthesize(prompt),
                    source: ScriptStrategy::Fallback,
                }
            }
        }
    }
}
