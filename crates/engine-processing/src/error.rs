use engine_core::error::{BrokerError, SetupError};
use thiserror::Error;

/// A script return value that cannot be turned into messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid key, {0}")]
    InvalidKey(String),

    #[error("invalid value, {0}")]
    InvalidValue(String),

    #[error("invalid topic, {0}")]
    InvalidTopic(String),

    #[error("invalid partition, {0}")]
    InvalidPartition(String),

    #[error("invalid headers, must be nil or table: {0}")]
    InvalidHeaders(String),

    #[error("invalid header '{key}', {message}")]
    InvalidHeader { key: String, message: String },

    #[error("script returned invalid value: {0}")]
    InvalidReturn(String),

    #[error("failed to read script result: {0}")]
    Lua(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Failed to load script: {0}")]
    Load(String),

    #[error("script should define `onRecord` as function, not {0}")]
    MissingEntrypoint(String),

    #[error("script failed: {0}")]
    Runtime(String),

    #[error("Failed to pass record to script: {0}")]
    Conversion(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Script worker {worker} panicked: {message}")]
    Panic { worker: usize, message: String },

    #[error("Script worker {0} is no longer running")]
    WorkerGone(usize),
}

/// Cause of a failed sync session. Cloned to every observer of the session's
/// cancellation context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Setup failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Produce failed: {0}")]
    Produce(#[from] BrokerError),

    #[error("Failed to finalize sync: {0}")]
    Finalize(String),

    #[error("Sync cancelled")]
    Cancelled,
}
