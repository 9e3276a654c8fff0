use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a job file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read job file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse job file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Job validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),
}
