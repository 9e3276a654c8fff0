use crate::{error::ConfigError, job::validator::JobValidator};
use connectors::source::Driver;
use model::{
    core::store_type::StoreType,
    mapping::field::{FieldTransform, PropertyType},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod ranges;
pub mod validator;

pub use ranges::{KeySpan, RangeBound, RangeSettings};

/// A complete import job as read from its TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub job: JobSettings,
    pub source: SourceSettings,
    #[serde(default)]
    pub workers: WorkerSettings,
    pub ranges: RangeSettings,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub transforms: TransformSettings,
    #[serde(default)]
    pub output: OutputSettings,
    pub upload: Option<UploadSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSettings {
    pub name: String,
    /// Join column shared by every data source; also the document id.
    pub top_level_key_column: String,
    #[serde(default = "default_entities_per_batch")]
    pub entities_per_batch: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    pub driver: Driver,
    pub url: String,
    /// Zero keeps the driver's default.
    #[serde(default)]
    pub command_timeout_secs: u64,
}

/// Worker count per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "one")]
    pub extract: usize,
    #[serde(default = "one")]
    pub assemble: usize,
    #[serde(default = "one")]
    pub batch: usize,
    #[serde(default = "one")]
    pub save: usize,
    #[serde(default = "one")]
    pub upload: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        WorkerSettings {
            extract: 1,
            assemble: 1,
            batch: 1,
            save: 1,
            upload: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    /// Defaults to the 1-based position in the job file.
    #[serde(default)]
    pub sequence_number: usize,
    pub sql: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl DataSource {
    /// Task key shared by every work item produced for this source.
    pub fn query_id(&self) -> String {
        format!("q{}", self.sequence_number)
    }

    /// Fields that produce a calculated column.
    pub fn calculated_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| f.destination.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    pub source: String,
    pub destination: Option<String>,
    #[serde(default)]
    pub destination_type: StoreType,
    #[serde(default)]
    pub transform: FieldTransform,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformSettings {
    /// CSV lookup table with `zip,lat,lon` rows.
    pub geocode_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Completed batches are written here when set.
    pub directory: Option<PathBuf>,
    /// Index mapping document is written here by `probe` when set.
    pub mapping_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    pub url: String,
    pub index: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Log request bodies along with headers.
    #[serde(default)]
    pub log_content: bool,
}

impl JobConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "Loaded job file");
        Self::from_toml_str(&text)
    }

    /// Parses, numbers data sources and validates.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: JobConfig = toml::from_str(text)?;
        config.assign_sequence_numbers();
        JobValidator::new(&config).validate()?;
        Ok(config)
    }

    fn assign_sequence_numbers(&mut self) {
        for (position, data_source) in self.data_sources.iter_mut().enumerate() {
            if data_source.sequence_number == 0 {
                data_source.sequence_number = position + 1;
            }
        }
    }
}

fn default_entities_per_batch() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    64
}

fn default_monitor_interval() -> u64 {
    10
}

fn default_max_attempts() -> usize {
    3
}

fn default_timeout() -> u64 {
    30
}

fn one() -> usize {
    1
}
