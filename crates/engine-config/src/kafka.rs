use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Strategy the producer uses for messages without an explicit partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Partitioner {
    #[default]
    Default,
    LeastBackup,
    /// Every message goes to the partition the script asked for.
    Manual,
    RoundRobin,
    StickyKey,
    Sticky,
}

impl Partitioner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partitioner::Default => "Default",
            Partitioner::LeastBackup => "LeastBackup",
            Partitioner::Manual => "Manual",
            Partitioner::RoundRobin => "RoundRobin",
            Partitioner::StickyKey => "StickyKey",
            Partitioner::Sticky => "Sticky",
        }
    }
}

impl FromStr for Partitioner {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "Default" => Ok(Partitioner::Default),
            "LeastBackup" => Ok(Partitioner::LeastBackup),
            "Manual" => Ok(Partitioner::Manual),
            "RoundRobin" => Ok(Partitioner::RoundRobin),
            "StickyKey" => Ok(Partitioner::StickyKey),
            "Sticky" => Ok(Partitioner::Sticky),
            other => Err(ConfigError::UnknownPartitioner(other.to_string())),
        }
    }
}

impl TryFrom<String> for Partitioner {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Partitioner> for String {
    fn from(value: Partitioner) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Partitioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl SaslMechanism {
    /// Name as librdkafka expects it in `sasl.mechanisms`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaslMechanism::Plain => "PLAIN",
            SaslMechanism::ScramSha256 => "SCRAM-SHA-256",
            SaslMechanism::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

impl FromStr for SaslMechanism {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PLAIN" => Ok(SaslMechanism::Plain),
            "SCRAM-SHA-256" => Ok(SaslMechanism::ScramSha256),
            "SCRAM-SHA-512" => Ok(SaslMechanism::ScramSha512),
            other => Err(ConfigError::UnsupportedSasl(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub servers: Vec<String>,
    pub username: String,
    pub password: String,
    pub sasl: String,
    pub disable_tls: bool,
    pub partitioner: Partitioner,
    pub client_id: Option<String>,
    /// Raw client properties applied last, overriding anything derived above.
    pub properties: BTreeMap<String, String>,
}

impl KafkaConfig {
    pub fn new<S: Into<String>>(servers: impl IntoIterator<Item = S>) -> Self {
        KafkaConfig {
            servers: servers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn bootstrap_servers(&self) -> String {
        self.servers.join(",")
    }

    /// Authentication is only configured when a username is present; the
    /// mechanism must then be one the producer supports.
    pub fn sasl_mechanism(&self) -> Result<Option<SaslMechanism>, ConfigError> {
        if self.username.is_empty() {
            return Ok(None);
        }
        self.sasl.parse().map(Some)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "kafka.servers must list at least one broker".into(),
            ));
        }
        self.sasl_mechanism()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partitioner_names() {
        assert_eq!("".parse::<Partitioner>().unwrap(), Partitioner::Default);
        assert_eq!(
            "StickyKey".parse::<Partitioner>().unwrap(),
            Partitioner::StickyKey
        );
        assert!(matches!(
            "Hash".parse::<Partitioner>(),
            Err(ConfigError::UnknownPartitioner(name)) if name == "Hash"
        ));
    }

    #[test]
    fn sasl_requires_known_mechanism_only_with_username() {
        let mut config = KafkaConfig::new(["localhost:9092"]);
        config.sasl = "GSSAPI".into();
        assert_eq!(config.sasl_mechanism().unwrap(), None);

        config.username = "user".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "unsupported SASL mechanism: GSSAPI");

        config.sasl = "SCRAM-SHA-512".into();
        assert_eq!(
            config.sasl_mechanism().unwrap(),
            Some(SaslMechanism::ScramSha512)
        );
    }

    #[test]
    fn rejects_missing_servers() {
        let config = KafkaConfig::new([" "]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
