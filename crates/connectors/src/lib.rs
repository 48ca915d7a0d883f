pub mod cdc;
pub mod error;
pub mod file;
pub mod kafka;
pub mod qrep;
