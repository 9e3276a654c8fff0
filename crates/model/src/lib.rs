pub mod core;
pub mod mapping;
pub mod records;
