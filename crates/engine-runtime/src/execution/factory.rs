use crate::{connector::KafkaConnector, error::ConnectorError};
use connectors::kafka::client::KafkaBrokerClient;
use engine_config::sink::SinkConfig;
use engine_core::state::{MetadataStore, sled_store::SledMetadataStore};
use std::sync::Arc;
use tracing::info;

/// Opens the durable metadata store under `config.state_dir`.
pub fn open_store(config: &SinkConfig) -> Result<Arc<dyn MetadataStore>, ConnectorError> {
    let store = SledMetadataStore::open(&config.state_dir)?;
    info!(path = %config.state_dir.display(), "Metadata store opened");
    Ok(Arc::new(store))
}

/// Builds a connector backed by librdkafka and the sled store. Must be called
/// from within a tokio runtime.
pub fn create_connector(config: &SinkConfig) -> Result<KafkaConnector, ConnectorError> {
    let broker = KafkaBrokerClient::new(&config.kafka)?;
    let store = open_store(config)?;
    Ok(KafkaConnector::new(
        Arc::new(broker),
        store,
        config.sync.clone(),
    ))
}
