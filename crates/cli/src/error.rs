use connectors::{error::AdapterError, sql::base::error::DbError};
use engine_config::error::ConfigError;
use engine_processing::error::ProbeError;
use engine_runtime::{error::RunError, planning::PlanError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the job file: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to run the job: {0}")]
    Runner(#[from] RunError),

    #[error("Schema probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Invalid key ranges: {0}")]
    Planning(#[from] PlanError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Connection test failed: {0}")]
    Database(#[from] DbError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),
}

impl CliError {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, CliError::Runner(err) if err.is_cancelled())
    }
}
