pub mod connector;
pub mod error;
pub mod execution;
