pub mod executor;
pub mod monitor;
pub mod summary;

pub use executor::{PipelineRunner, run};
pub use summary::RunSummary;
