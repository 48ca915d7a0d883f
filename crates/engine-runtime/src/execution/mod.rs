pub mod cdc;
pub mod factory;
pub mod heartbeat;
pub mod qrep;
pub mod request;
pub(crate) mod transform;
