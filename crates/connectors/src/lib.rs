pub mod error;
pub mod memory;
pub mod source;
pub mod sql;
