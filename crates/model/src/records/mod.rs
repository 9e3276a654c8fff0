pub mod range;
pub mod row;
