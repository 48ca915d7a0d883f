use engine_config::error::ConfigError;
use engine_core::error::{SetupError, StoreError};
use engine_processing::error::SyncError;
use thiserror::Error;

/// Errors of the connector outside a sync session.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
}
