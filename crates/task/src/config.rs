//! Engine configuration with defaults and environment overrides

use plasma_cache::CacheMode;
use plasma_core::{
    ResultExt, PLASMA_CACHE_DIR_VAR, PLASMA_CACHE_MODE_VAR, PLASMA_TIMEOUT_VAR, PLASMA_WORKERS_VAR,
};
use plasma_host::OutputPolicy;
use plasma_utils::XdgPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Wall-clock budget for one execution unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Settings for an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Root of the on-disk cache store
    pub cache_dir: PathBuf,
    /// Global read/write gate for the store
    pub cache_mode: CacheMode,
    /// Per-execution timeout, written as a duration literal such as `10m`
    #[serde(with = "duration_literal")]
    pub timeout: Duration,
    /// Maximum concurrent executions
    pub workers: usize,
    /// Whether recipes may write outside their declared outputs
    pub output_policy: OutputPolicy,
    /// Copy artifacts back into the recipe directory after each run
    pub materialize_outputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: XdgPaths::recipe_cache_dir(),
            cache_mode: CacheMode::default(),
            timeout: DEFAULT_TIMEOUT,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            output_policy: OutputPolicy::default(),
            materialize_outputs: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `PLASMA_*` environment variables
    pub fn from_env() -> plasma_core::Result<Self> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> plasma_core::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(PLASMA_CACHE_DIR_VAR).filter(|v| !v.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup(PLASMA_CACHE_MODE_VAR) {
            self.cache_mode = mode.parse()?;
        }
        if let Some(timeout) = lookup(PLASMA_TIMEOUT_VAR) {
            self.timeout = plasma_recipe::parse_duration(&timeout)?;
        }
        if let Some(workers) = lookup(PLASMA_WORKERS_VAR) {
            self.workers = workers.trim().parse().context(PLASMA_WORKERS_VAR)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> plasma_core::Result<()> {
        if self.workers == 0 {
            return Err(plasma_core::Error::configuration("workers must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(plasma_core::Error::configuration("timeout must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_output_policy(mut self, policy: OutputPolicy) -> Self {
        self.output_policy = policy;
        self
    }

    #[must_use]
    pub fn with_materialize_outputs(mut self, enabled: bool) -> Self {
        self.materialize_outputs = enabled;
        self
    }
}

mod duration_literal {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", value.as_secs()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let literal = String::deserialize(deserializer)?;
        plasma_recipe::parse_duration(&literal).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.cache_mode, CacheMode::ReadWrite);
        assert_eq!(config.output_policy, OutputPolicy::Capture);
        assert!(config.materialize_outputs);
        assert!(config.workers >= 1);
        assert!(config.cache_dir.ends_with("recipes"));
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .with_env_overrides(lookup(&[
                (PLASMA_CACHE_DIR_VAR, "/tmp/plasma-cache"),
                (PLASMA_CACHE_MODE_VAR, "read"),
                (PLASMA_TIMEOUT_VAR, "30s"),
                (PLASMA_WORKERS_VAR, "3"),
            ]))
            .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/plasma-cache"));
        assert_eq!(config.cache_mode, CacheMode::Read);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_invalid_overrides() {
        assert!(EngineConfig::default()
            .with_env_overrides(lookup(&[(PLASMA_WORKERS_VAR, "many")]))
            .is_err());
        assert!(EngineConfig::default()
            .with_env_overrides(lookup(&[(PLASMA_WORKERS_VAR, "0")]))
            .is_err());
        assert!(EngineConfig::default()
            .with_env_overrides(lookup(&[(PLASMA_TIMEOUT_VAR, "soon")]))
            .is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var(PLASMA_WORKERS_VAR, "2");
        std::env::set_var(PLASMA_CACHE_MODE_VAR, "off");
        let config = EngineConfig::from_env();
        std::env::remove_var(PLASMA_WORKERS_VAR);
        std::env::remove_var(PLASMA_CACHE_MODE_VAR);

        let config = config.unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.cache_mode, CacheMode::Off);
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"timeout": "2m", "outputPolicy": "enforce"}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.output_policy, OutputPolicy::Enforce);
        assert!(config.materialize_outputs);
    }
}
