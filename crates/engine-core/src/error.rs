use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Failed to produce message to topic '{topic}': {message}")]
    Produce { topic: String, message: String },

    #[error("Delivery of message to topic '{0}' was cancelled before acknowledgement")]
    DeliveryCancelled(String),

    #[error("Flush failed: {0}")]
    Flush(String),

    #[error("Broker unreachable: {0}")]
    Ping(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to open metadata store: {0}")]
    Open(String),

    #[error("Failed to load offset for flow '{flow}': {message}")]
    Load { flow: String, message: String },

    #[error("Failed to save offset for flow '{flow}': {message}")]
    Save { flow: String, message: String },

    #[error("Failed to finish {what} for flow '{flow}': {message}")]
    Finish {
        flow: String,
        what: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Raised while constructing a connector; never recoverable by retrying the sync.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("unsupported SASL mechanism: {0}")]
    UnsupportedSasl(String),

    #[error("Invalid broker configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create kafka client: {0}")]
    Client(String),

    #[error("Metadata store error: {0}")]
    Store(#[from] StoreError),
}
