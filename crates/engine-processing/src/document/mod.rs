pub mod builder;
pub mod writer;

pub use builder::EntityDocumentBuilder;
pub use writer::{JsonValueWriter, StoreJsonValueWriter};
