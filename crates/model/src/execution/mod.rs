pub mod partition;
pub mod schema;
pub mod summary;
