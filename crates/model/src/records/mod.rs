pub mod message;
pub mod record;
pub mod result;
