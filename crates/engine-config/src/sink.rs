use crate::{error::ConfigError, kafka::KafkaConfig, sync::SyncSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Full configuration of one sink process, usually read from a TOML file.
///
/// ```toml
/// flow_job_name = "orders_to_kafka"
/// state_dir = "/var/lib/kafka-sink"
///
/// [kafka]
/// servers = ["broker-1:9092"]
/// partitioner = "StickyKey"
///
/// [sync]
/// worker_pool_size = 8
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    pub flow_job_name: String,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".kafka-sink/state")
}

impl SinkConfig {
    /// Reads, applies environment overrides and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut config = Self::parse(&source)?;
        config.sync.apply_env()?;
        config.validate()?;

        info!(
            flow = %config.flow_job_name,
            servers = %config.kafka.bootstrap_servers(),
            partitioner = %config.kafka.partitioner,
            workers = config.sync.worker_pool_size,
            "Loaded sink configuration"
        );
        Ok(config)
    }

    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flow_job_name.trim().is_empty() {
            return Err(ConfigError::Invalid("flow_job_name must not be empty".into()));
        }
        self.kafka.validate()?;
        self.sync.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::Partitioner;
    use std::io::Write;

    const SAMPLE: &str = r#"
        flow_job_name = "orders"

        [kafka]
        servers = ["a:9092", "b:9092"]
        username = "svc"
        password = "secret"
        sasl = "PLAIN"
        disable_tls = true
        partitioner = "Manual"

        [kafka.properties]
        "linger.ms" = "5"

        [sync]
        worker_pool_size = 2
    "#;

    #[test]
    fn parses_full_document() {
        let config = SinkConfig::parse(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.flow_job_name, "orders");
        assert_eq!(config.kafka.bootstrap_servers(), "a:9092,b:9092");
        assert_eq!(config.kafka.partitioner, Partitioner::Manual);
        assert!(config.kafka.disable_tls);
        assert_eq!(config.kafka.properties.get("linger.ms").unwrap(), "5");
        assert_eq!(config.sync.worker_pool_size, 2);
        assert_eq!(config.sync.flush_interval_secs, 10);
        assert_eq!(config.state_dir, PathBuf::from(".kafka-sink/state"));
    }

    #[test]
    fn unknown_partitioner_fails_parse() {
        let source = r#"
            flow_job_name = "f"
            [kafka]
            servers = ["a:9092"]
            partitioner = "Hash"
        "#;
        assert!(matches!(
            SinkConfig::parse(source),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = SinkConfig::load(file.path()).unwrap();
        assert_eq!(config.flow_job_name, "orders");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SinkConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
