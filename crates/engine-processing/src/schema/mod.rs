pub mod columns;
pub mod index_mapping;
pub mod probe;

pub use columns::resolve_columns;
pub use probe::SchemaProbe;
