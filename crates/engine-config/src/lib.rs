pub mod error;
pub mod kafka;
pub mod sink;
pub mod sync;
