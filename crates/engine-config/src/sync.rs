use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const PARALLELISM_ENV: &str = "SINK_QUEUE_PARALLELISM";
pub const FLUSH_TIMEOUT_ENV: &str = "SINK_QUEUE_FLUSH_TIMEOUT_SECONDS";

const DEFAULT_WORKER_POOL_SIZE: usize = 4;
const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Knobs of a sync session: script worker parallelism and background timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub worker_pool_size: usize,
    pub flush_interval_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

impl SyncSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(size) = parse_env(&lookup, PARALLELISM_ENV)? {
            debug!(worker_pool_size = size, "Worker pool size overridden from environment");
            self.worker_pool_size = size as usize;
        }
        if let Some(secs) = parse_env(&lookup, FLUSH_TIMEOUT_ENV)? {
            debug!(flush_interval_secs = secs, "Flush interval overridden from environment");
            self.flush_interval_secs = secs;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::Invalid(
                "sync.worker_pool_size must be at least 1".into(),
            ));
        }
        if self.flush_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.flush_interval_secs must be greater than 0".into(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync.heartbeat_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<F>(lookup: &F, name: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                name: name.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let settings = SyncSettings::default();
        assert_eq!(settings.worker_pool_size, 4);
        assert_eq!(settings.flush_interval(), Duration::from_secs(10));
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut settings = SyncSettings::default().with_worker_pool_size(2);
        settings
            .apply_env_from(env(&[(PARALLELISM_ENV, "8"), (FLUSH_TIMEOUT_ENV, " 3 ")]))
            .unwrap();

        assert_eq!(settings.worker_pool_size, 8);
        assert_eq!(settings.flush_interval_secs, 3);
    }

    #[test]
    fn rejects_garbage_in_environment() {
        let mut settings = SyncSettings::default();
        let err = settings
            .apply_env_from(env(&[(PARALLELISM_ENV, "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn zero_pool_is_invalid() {
        let settings = SyncSettings::default().with_worker_pool_size(0);
        assert!(settings.validate().is_err());
    }
}
