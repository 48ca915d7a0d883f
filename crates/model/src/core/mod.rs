pub mod items;
pub mod value;
