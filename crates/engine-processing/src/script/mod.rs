pub mod context;
pub mod decode;
pub mod record;
