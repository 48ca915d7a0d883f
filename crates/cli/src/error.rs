use connectors::error::SourceError;
use engine_config::error::ConfigError;
use engine_core::error::{BrokerError, StoreError};
use engine_processing::error::SyncError;
use engine_runtime::error::ConnectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the sink configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read script {path}: {source}")]
    ScriptRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create the connector: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Failed to read input: {0}")]
    Source(#[from] SourceError),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Broker unreachable: {0}")]
    Broker(#[from] BrokerError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
