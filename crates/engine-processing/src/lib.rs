pub mod batch;
pub mod document;
pub mod error;
pub mod extract;
pub mod item;
pub mod retry;
pub mod schema;
pub mod transform;
pub mod upload;
