use crate::{
    error::UploadError,
    item::{BatchPayload, UploadReceipt},
};
use async_trait::async_trait;
use engine_core::{metrics::Metrics, stage::Stage};
use futures::future::try_join_all;
use std::{fmt, sync::Arc};
use tracing::debug;

pub mod file;
pub mod http;

pub use file::FileBatchWriter;
pub use http::BulkHttpUploader;

pub const STAGE_NAME: &str = "upload";

/// Destination for completed batch payloads.
#[async_trait]
pub trait Uploader: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn upload(&self, payload: &BatchPayload) -> Result<(), UploadError>;
}

/// Hands every payload to all configured uploaders.
pub struct BatchUploader {
    uploaders: Vec<Arc<dyn Uploader>>,
    metrics: Metrics,
}

impl BatchUploader {
    pub fn new(uploaders: Vec<Arc<dyn Uploader>>, metrics: Metrics) -> Self {
        BatchUploader { uploaders, metrics }
    }

    pub fn destinations(&self) -> Vec<String> {
        self.uploaders.iter().map(|u| u.name().to_string()).collect()
    }
}

#[async_trait]
impl Stage for BatchUploader {
    type Input = BatchPayload;
    type Output = UploadReceipt;
    type Error = UploadError;

    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn handle(&self, payload: BatchPayload) -> Result<Vec<UploadReceipt>, UploadError> {
        try_join_all(self.uploaders.iter().map(|u| u.upload(&payload))).await?;

        self.metrics.increment_batches(1);
        self.metrics.increment_bytes(payload.content.len() as u64);
        debug!(
            batch_number = payload.batch_number,
            documents = payload.document_count,
            destinations = self.uploaders.len(),
            "Batch uploaded"
        );

        Ok(vec![UploadReceipt {
            query_id: payload.query_id,
            batch_number: payload.batch_number,
            document_count: payload.document_count,
            bytes: payload.content.len(),
            destinations: self.destinations(),
        }])
    }
}
