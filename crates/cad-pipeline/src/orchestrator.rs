use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cad_ai::{GeneratorConfig, LanguageModel, ScriptGenerator, ScriptStrategy, synthesize};
use cad_script::validate_script;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{ExecutionError, PipelineError, StorageError};
use crate::quota::QuotaLedger;
use crate::sandbox::Sandbox;
use crate::store::ArtifactStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStep {
    RunScript,
    DefaultArtifact,
}

/// Script acquisition order for prompts.
pub const SCRIPT_STRATEGIES: &[ScriptStrategy] = &[ScriptStrategy::Ai, ScriptStrategy::Fallback];
/// Execution plan for scripts the system produced itself.
pub const SYSTEM_EXECUTION_PLAN: &[ExecutionStep] =
    &[ExecutionStep::RunScript, ExecutionStep::DefaultArtifact];
/// Execution plan for caller-provided scripts; failures surface.
pub const CALLER_EXECUTION_PLAN: &[ExecutionStep] = &[ExecutionStep::RunScript];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    AiGenerated,
    FallbackGenerated,
    DefaultArtifact,
    UserProvided,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub artifact_id: String,
    pub script: String,
    pub status: GenerationStatus,
    pub message: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Drives a request from prompt or script to a registered artifact.
pub struct Orchestrator {
    generator: ScriptGenerator,
    sandbox: Arc<Sandbox>,
    store: Arc<ArtifactStore>,
    quota: QuotaLedger,
}

impl Orchestrator {
    pub fn new(config: &PipelineConfig, model: Arc<dyn LanguageModel>) -> Self {
        let generator = ScriptGenerator::new(
            model,
            GeneratorConfig {
                timeout: config.ai_timeout,
                ..GeneratorConfig::default()
            },
        );
        Self {
            generator,
            sandbox: Arc::new(Sandbox::from_config(config)),
            store: Arc::new(ArtifactStore::new(&config.temp_dir)),
            quota: QuotaLedger::new(config.max_models_per_user),
        }
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn quota(&self) -> &QuotaLedger {
        &self.quota
    }

    pub async fn generate(
        &self,
        prompt: &str,
        user_id: Option<&str>,
    ) -> Result<GenerationOutcome, PipelineError> {
        let mut attempt = Attempt::new("generate", prompt, user_id);
        let result = self.run_generate(prompt.trim(), user_id, &mut attempt).await;
        attempt.finish(&result);
        result
    }

    pub async fn execute(
        &self,
        code: &str,
        user_id: Option<&str>,
    ) -> Result<GenerationOutcome, PipelineError> {
        let mut attempt = Attempt::new("execute", code, user_id);
        let result = self.run_execute(code, user_id, &mut attempt).await;
        attempt.finish(&result);
        result
    }

    async fn run_generate(
        &self,
        prompt: &str,
        user_id: Option<&str>,
        attempt: &mut Attempt<'_>,
    ) -> Result<GenerationOutcome, PipelineError> {
        if prompt.is_empty() {
            return Err(PipelineError::InvalidInput("No prompt provided".to_string()));
        }
        let reservation = user_id.map(|user| self.quota.reserve(user)).transpose()?;

        let (script, strategy) = self.obtain_script(prompt).await;
        attempt.strategy = Some(strategy);

        let artifact_id = Uuid::new_v4().to_string();
        let pending = PendingArtifact::new(self.sandbox.artifact_path(&artifact_id));
        let (path, step) = self
            .run_plan(SYSTEM_EXECUTION_PLAN, &script, &artifact_id, &pending)
            .await?;
        attempt.step = Some(step);

        self.register(&artifact_id, &path).await?;
        pending.disarm();
        if let Some(reservation) = reservation {
            reservation.commit();
        }

        let (status, message) = match (step, strategy) {
            (ExecutionStep::DefaultArtifact, _) => (
                GenerationStatus::DefaultArtifact,
                format!("Generated default model for: \"{prompt}\" (script execution failed)"),
            ),
            (_, ScriptStrategy::Ai) => (
                GenerationStatus::AiGenerated,
                format!("Generated model for: \"{prompt}\""),
            ),
            (_, ScriptStrategy::Fallback) => (
                GenerationStatus::FallbackGenerated,
                format!(
                    "Generated fallback model for: \"{prompt}\" (AI service temporarily unavailable)"
                ),
            ),
        };
        Ok(GenerationOutcome {
            artifact_id,
            script,
            status,
            message,
            path,
        })
    }

    async fn run_execute(
        &self,
        code: &str,
        user_id: Option<&str>,
        attempt: &mut Attempt<'_>,
    ) -> Result<GenerationOutcome, PipelineError> {
        if code.trim().is_empty() {
            return Err(PipelineError::InvalidInput("No code provided".to_string()));
        }
        let reservation = user_id.map(|user| self.quota.reserve(user)).transpose()?;
        validate_script(code).map_err(PipelineError::ScriptValidation)?;

        let artifact_id = Uuid::new_v4().to_string();
        let pending = PendingArtifact::new(self.sandbox.artifact_path(&artifact_id));
        let (path, step) = self
            .run_plan(CALLER_EXECUTION_PLAN, code, &artifact_id, &pending)
            .await?;
        attempt.step = Some(step);

        self.register(&artifact_id, &path).await?;
        pending.disarm();
        if let Some(reservation) = reservation {
            reservation.commit();
        }

        Ok(GenerationOutcome {
            artifact_id,
            script: code.to_string(),
            status: GenerationStatus::UserProvided,
            message: "Script executed successfully".to_string(),
            path,
        })
    }

    /// Walks [`SCRIPT_STRATEGIES`] until one yields a valid script.
    async fn obtain_script(&self, prompt: &str) -> (String, ScriptStrategy) {
        for &strategy in SCRIPT_STRATEGIES {
            let candidate = match strategy {
                ScriptStrategy::Ai => match self.generator.try_generate(prompt).await {
                    Ok(script) => script,
                    Err(failure) => {
                        warn!(
                            kind = failure.kind(),
                            error = %failure,
                            "AI generation failed, degrading"
                        );
                        continue;
                    }
                },
                ScriptStrategy::Fallback => synthesize(prompt),
            };
            match validate_script(&candidate) {
                Ok(()) => return (candidate, strategy),
                Err(issue) => warn!(?strategy, %issue, "script rejected by validator"),
            }
        }
        (synthesize(prompt), ScriptStrategy::Fallback)
    }

    /// Tries each step in order; the last failure is returned when all fail.
    async fn run_plan(
        &self,
        plan: &[ExecutionStep],
        script: &str,
        artifact_id: &str,
        pending: &PendingArtifact,
    ) -> Result<(PathBuf, ExecutionStep), PipelineError> {
        let mut last_error = None;
        for &step in plan {
            let sandbox = Arc::clone(&self.sandbox);
            let script = script.to_string();
            let id = artifact_id.to_string();
            let abandoned = pending.abandoned();

            let joined = tokio::task::spawn_blocking(move || {
                let result = match step {
                    ExecutionStep::RunScript => sandbox.execute(&script, &id),
                    ExecutionStep::DefaultArtifact => sandbox.write_default_artifact(&id),
                };
                if abandoned.load(Ordering::SeqCst)
                    && let Ok(path) = &result
                {
                    remove_quietly(path);
                }
                result
            })
            .await;

            match joined {
                Ok(Ok(path)) => return Ok((path, step)),
                Ok(Err(err)) => {
                    warn!(?step, error = %err, "execution step failed");
                    last_error = Some(PipelineError::from(err));
                }
                Err(join_err) => {
                    warn!(?step, error = %join_err, "execution task aborted");
                    last_error = Some(StorageError::Task(join_err.to_string()).into());
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| PipelineError::from(ExecutionError::EmptyArtifact)))
    }

    async fn register(&self, artifact_id: &str, path: &Path) -> Result<(), PipelineError> {
        let written = tokio::fs::metadata(path)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(StorageError::MissingArtifact {
                path: path.to_path_buf(),
            }
            .into());
        }
        self.store.store(artifact_id, path);
        Ok(())
    }
}

/// Owns a not-yet-registered artifact path. Dropping it armed deletes the
/// file and flags the attempt so a late blocking write cleans up too.
#[derive(Debug)]
struct PendingArtifact {
    path: PathBuf,
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl PendingArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            abandoned: Arc::new(AtomicBool::new(false)),
            armed: true,
        }
    }

    fn abandoned(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abandoned)
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.abandoned.store(true, Ordering::SeqCst);
        remove_quietly(&self.path);
        debug!(path = %self.path.display(), "discarded unregistered artifact");
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_file(path)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %err, "failed to remove artifact file");
    }
}

/// One pipeline invocation, logged once when it ends.
struct Attempt<'a> {
    operation: &'static str,
    input: &'a str,
    user_id: Option<&'a str>,
    strategy: Option<ScriptStrategy>,
    step: Option<ExecutionStep>,
    started: Instant,
}

impl<'a> Attempt<'a> {
    fn new(operation: &'static str, input: &'a str, user_id: Option<&'a str>) -> Self {
        Self {
            operation,
            input,
            user_id,
            strategy: None,
            step: None,
            started: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn finish(&self, result: &Result<GenerationOutcome, PipelineError>) {
        let input: String = self.input.chars().take(100).collect();
        let elapsed_ms = self.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(outcome) => info!(
                operation = self.operation,
                input = %input,
                user_id = self.user_id,
                strategy = ?self.strategy,
                step = ?self.step,
                artifact_id = %outcome.artifact_id,
                status = ?outcome.status,
                elapsed_ms,
                "pipeline attempt completed"
            ),
            Err(err) => warn!(
                operation = self.operation,
                input = %input,
                user_id = self.user_id,
                strategy = ?self.strategy,
                step = ?self.step,
                client_error = err.is_client_error(),
                error = %err,
                elapsed_ms,
                "pipeline attempt rejected"
            ),
        }
    }
}
