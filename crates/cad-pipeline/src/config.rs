use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cad_script::SandboxLimits;

/// Settings shared by the sandbox, the store and the quota ledger.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub temp_dir: PathBuf,
    pub max_models_per_user: u32,
    /// Cells along the longest axis of an exported model.
    pub mesh_resolution: usize,
    pub ai_timeout: Duration,
    pub artifact_max_age: Duration,
    pub limits: SandboxLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("text-to-cad"),
            max_models_per_user: 10,
            mesh_resolution: 64,
            ai_timeout: Duration::from_secs(30),
            artifact_max_age: Duration::from_secs(24 * 60 * 60),
            limits: SandboxLimits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; missing or unparsable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let hours = parse_or(
            &lookup,
            "ARTIFACT_MAX_AGE_HOURS",
            defaults.artifact_max_age.as_secs() / 3600,
        );
        Self {
            temp_dir: lookup("CAD_TEMP_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_models_per_user: parse_or(
                &lookup,
                "MAX_MODELS_PER_USER",
                defaults.max_models_per_user,
            ),
            mesh_resolution: parse_or(&lookup, "CAD_MESH_RESOLUTION", defaults.mesh_resolution)
                .max(2),
            ai_timeout: Duration::from_secs(parse_or(
                &lookup,
                "AI_TIMEOUT_SECS",
                defaults.ai_timeout.as_secs(),
            )),
            artifact_max_age: Duration::from_secs(hours.saturating_mul(3600)),
            limits: defaults.limits,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}

pub(crate) fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
