pub mod data_type;
pub mod store_type;
pub mod value;
