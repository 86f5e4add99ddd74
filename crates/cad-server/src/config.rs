use std::str::FromStr;
use std::time::Duration;

use cad_pipeline::PipelineConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    pub enable_auth: bool,
    pub admin_api_key: Option<String>,
    pub cleanup_interval: Duration,
    pub log_json: bool,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: Vec::new(),
            enable_auth: false,
            admin_api_key: None,
            cleanup_interval: Duration::from_secs(3600),
            log_json: false,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            cors_origins: non_empty("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            enable_auth: parse_or(&lookup, "ENABLE_AUTH", defaults.enable_auth),
            admin_api_key: non_empty("ADMIN_API_KEY"),
            cleanup_interval: Duration::from_secs(
                parse_or(&lookup, "CLEANUP_INTERVAL_SECS", defaults.cleanup_interval.as_secs())
                    .max(1),
            ),
            log_json: non_empty("CAD_LOG_FORMAT").is_some_and(|format| format.trim() == "json"),
            pipeline: PipelineConfig::from_lookup(&lookup),
        }
    }
}

fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::ServerConfig;

    fn config_from(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.cors_origins.is_empty());
        assert!(!config.enable_auth);
        assert_eq!(config.admin_api_key, None);
        assert_eq!(config.cleanup_interval, Duration::from_secs(3600));
        assert!(!config.log_json);
        assert_eq!(config.pipeline.max_models_per_user, 10);
    }

    #[test]
    fn environment_overrides() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("ENABLE_AUTH", "true"),
            ("ADMIN_API_KEY", "k"),
            ("CLEANUP_INTERVAL_SECS", "60"),
            ("CAD_LOG_FORMAT", "json"),
            ("MAX_MODELS_PER_USER", "4"),
        ]);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.enable_auth);
        assert_eq!(config.admin_api_key.as_deref(), Some("k"));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert!(config.log_json);
        assert_eq!(config.pipeline.max_models_per_user, 4);
    }
}
