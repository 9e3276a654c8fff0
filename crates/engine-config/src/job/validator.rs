use crate::{error::ConfigError, job::JobConfig};
use model::{core::value::Value, mapping::field::FieldTransform};
use std::{cmp::Ordering, collections::HashSet};
use tracing::{info, warn};

/// Checks a parsed job for settings the pipeline cannot run with.
pub struct JobValidator<'a> {
    config: &'a JobConfig,
}

impl<'a> JobValidator<'a> {
    pub fn new(config: &'a JobConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_job(&mut errors);
        self.validate_workers(&mut errors);
        self.validate_ranges(&mut errors);
        self.validate_data_sources(&mut errors);
        self.validate_upload(&mut errors);

        if !errors.is_empty() {
            return Err(ConfigError::ValidationFailed(errors));
        }

        info!(job = %self.config.job.name, "Job validation completed successfully");
        Ok(())
    }

    fn validate_job(&self, errors: &mut Vec<String>) {
        let job = &self.config.job;
        if job.name.trim().is_empty() {
            errors.push("job.name must not be empty".to_string());
        }
        if !is_identifier(&job.top_level_key_column) {
            errors.push(format!(
                "job.top_level_key_column '{}' is not a plain column identifier",
                job.top_level_key_column
            ));
        }
        if job.entities_per_batch == 0 {
            errors.push("job.entities_per_batch must be greater than zero".to_string());
        } else if job.entities_per_batch > 10_000 {
            warn!(
                "entities_per_batch {} is very large, bulk requests may be rejected",
                job.entities_per_batch
            );
        }
        if job.queue_capacity == 0 {
            errors.push("job.queue_capacity must be greater than zero".to_string());
        }
        if self.config.source.url.trim().is_empty() {
            errors.push("source.url must not be empty".to_string());
        }
    }

    fn validate_workers(&self, errors: &mut Vec<String>) {
        let workers = &self.config.workers;
        for (stage, count) in [
            ("extract", workers.extract),
            ("assemble", workers.assemble),
            ("batch", workers.batch),
            ("save", workers.save),
            ("upload", workers.upload),
        ] {
            if count == 0 {
                errors.push(format!("workers.{stage} must be at least 1"));
            }
        }
    }

    fn validate_ranges(&self, errors: &mut Vec<String>) {
        let ranges = &self.config.ranges;
        if ranges.explicit.is_empty() && ranges.key_range.is_none() {
            errors.push("ranges must define `explicit` slices or a `key_range`".to_string());
        }

        for (start, end) in &ranges.explicit {
            let (start, end) = (Value::from(start), Value::from(end));
            match start.compare(&end) {
                Some(Ordering::Greater) => {
                    errors.push(format!("range [{start}, {end}] has start after end"))
                }
                None => errors.push(format!(
                    "range [{start}, {end}] mixes bound types that cannot be compared"
                )),
                _ => {}
            }
        }

        if let Some(span) = ranges.key_range {
            if span.slice_size <= 0 {
                errors.push("ranges.key_range.slice_size must be greater than zero".to_string());
            }
            if span.start > span.end {
                errors.push(format!(
                    "ranges.key_range start {} is after end {}",
                    span.start, span.end
                ));
            }
        }
    }

    fn validate_data_sources(&self, errors: &mut Vec<String>) {
        if self.config.data_sources.is_empty() {
            errors.push("at least one [[data_sources]] entry is required".to_string());
        }

        let mut sequence_numbers = HashSet::new();
        let geocoding_configured = self.config.transforms.geocode_file.is_some();

        for data_source in &self.config.data_sources {
            if !sequence_numbers.insert(data_source.sequence_number) {
                errors.push(format!(
                    "data source sequence number {} is used more than once",
                    data_source.sequence_number
                ));
            }
            if data_source.sql.trim().is_empty() {
                errors.push(format!(
                    "data source {} (path '{}') has an empty sql statement",
                    data_source.sequence_number, data_source.path
                ));
            }

            for field in &data_source.fields {
                if field.transform.is_none() {
                    continue;
                }
                if field.destination.is_none() {
                    errors.push(format!(
                        "field '{}' uses transform {} but has no destination",
                        field.source, field.transform
                    ));
                }
                let needs_geocoding = matches!(
                    field.transform,
                    FieldTransform::Zip3ToGeocode | FieldTransform::Zip5ToGeocode
                );
                if needs_geocoding && !geocoding_configured {
                    errors.push(format!(
                        "field '{}' uses transform {} but transforms.geocode_file is not set",
                        field.source, field.transform
                    ));
                }
            }
        }
    }

    fn validate_upload(&self, errors: &mut Vec<String>) {
        let Some(upload) = &self.config.upload else {
            if self.config.output.directory.is_none() {
                warn!("No output directory or upload endpoint configured, batches will be discarded");
            }
            return;
        };
        if upload.url.trim().is_empty() {
            errors.push("upload.url must not be empty".to_string());
        }
        if upload.index.trim().is_empty() {
            errors.push("upload.index must not be empty".to_string());
        }
        if upload.max_attempts == 0 {
            errors.push("upload.max_attempts must be at least 1".to_string());
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
