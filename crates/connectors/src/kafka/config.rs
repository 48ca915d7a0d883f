use engine_config::{
    error::ConfigError,
    kafka::{KafkaConfig, Partitioner},
};
use engine_core::error::SetupError;
use rdkafka::ClientConfig;

const DEFAULT_CLIENT_ID: &str = "kafka-sink";

/// Builds the producer configuration for `config`.
///
/// Delivery is at-least-once: the producer is idempotent with `acks=all`, so
/// client-side retries never duplicate or reorder within a partition.
pub fn client_config(config: &KafkaConfig) -> Result<ClientConfig, SetupError> {
    config.validate().map_err(|e| match e {
        ConfigError::UnsupportedSasl(mechanism) => SetupError::UnsupportedSasl(mechanism),
        other => SetupError::InvalidConfig(other.to_string()),
    })?;
    let sasl = config.sasl_mechanism().map_err(|e| SetupError::InvalidConfig(e.to_string()))?;

    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.bootstrap_servers())
        .set(
            "client.id",
            config.client_id.as_deref().unwrap_or(DEFAULT_CLIENT_ID),
        )
        .set("enable.idempotence", "true")
        .set("acks", "all");

    let protocol = match (sasl.is_some(), config.disable_tls) {
        (true, false) => "sasl_ssl",
        (true, true) => "sasl_plaintext",
        (false, false) => "ssl",
        (false, true) => "plaintext",
    };
    client.set("security.protocol", protocol);

    if let Some(mechanism) = sasl {
        client
            .set("sasl.mechanisms", mechanism.as_str())
            .set("sasl.username", &config.username)
            .set("sasl.password", &config.password);
    }

    apply_partitioner(&mut client, config.partitioner);

    for (key, value) in &config.properties {
        client.set(key, value);
    }

    Ok(client)
}

/// librdkafka has no least-loaded or strict round-robin partitioner; both are
/// approximated by per-message random assignment.
fn apply_partitioner(client: &mut ClientConfig, partitioner: Partitioner) {
    match partitioner {
        // Manual sets the partition on every message instead.
        Partitioner::Default | Partitioner::Manual => {}
        Partitioner::LeastBackup | Partitioner::RoundRobin => {
            client
                .set("partitioner", "random")
                .set("sticky.partitioning.linger.ms", "0");
        }
        Partitioner::StickyKey => {
            client.set("partitioner", "murmur2_random");
        }
        Partitioner::Sticky => {
            client.set("partitioner", "random");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_without_credentials() {
        let mut config = KafkaConfig::new(["a:9092", "b:9092"]);
        config.disable_tls = true;

        let client = client_config(&config).unwrap();
        assert_eq!(client.get("bootstrap.servers"), Some("a:9092,b:9092"));
        assert_eq!(client.get("security.protocol"), Some("plaintext"));
        assert_eq!(client.get("enable.idempotence"), Some("true"));
        assert!(client.get("sasl.mechanisms").is_none());
        assert!(client.get("partitioner").is_none());
    }

    #[test]
    fn scram_over_tls() {
        let mut config = KafkaConfig::new(["a:9092"]);
        config.username = "user".into();
        config.password = "pass".into();
        config.sasl = "SCRAM-SHA-256".into();

        let client = client_config(&config).unwrap();
        assert_eq!(client.get("security.protocol"), Some("sasl_ssl"));
        assert_eq!(client.get("sasl.mechanisms"), Some("SCRAM-SHA-256"));
        assert_eq!(client.get("sasl.username"), Some("user"));
    }

    #[test]
    fn unsupported_sasl_is_a_setup_error() {
        let mut config = KafkaConfig::new(["a:9092"]);
        config.username = "user".into();
        config.sasl = "OAUTHBEARER".into();

        assert_eq!(
            client_config(&config).unwrap_err(),
            SetupError::UnsupportedSasl("OAUTHBEARER".into())
        );
    }

    #[test]
    fn partitioner_and_passthrough_properties() {
        let mut config = KafkaConfig::new(["a:9092"]);
        config.partitioner = Partitioner::StickyKey;
        config
            .properties
            .insert("partitioner".into(), "fnv1a".into());
        config.properties.insert("linger.ms".into(), "20".into());

        let client = client_config(&config).unwrap();
        assert_eq!(client.get("partitioner"), Some("fnv1a"));
        assert_eq!(client.get("linger.ms"), Some("20"));

        config.properties.clear();
        config.partitioner = Partitioner::RoundRobin;
        let client = client_config(&config).unwrap();
        assert_eq!(client.get("partitioner"), Some("random"));
        assert_eq!(client.get("sticky.partitioning.linger.ms"), Some("0"));
    }
}
