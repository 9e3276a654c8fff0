pub mod column;
pub mod field;
pub mod item;
