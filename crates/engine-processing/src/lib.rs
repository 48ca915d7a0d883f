pub mod context;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod row_counts;
pub mod scheduler;
pub mod script;
