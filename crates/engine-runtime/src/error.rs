use crate::planning::PlanError;
use engine_core::error::{QueueError, StageError};
use engine_processing::error::{ProbeError, TransformError, UploadError};
use thiserror::Error;

/// Top-level errors of one pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Range planning failed: {0}")]
    Planning(#[from] PlanError),

    #[error("Schema probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Transform setup failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Upload setup failed: {0}")]
    Upload(#[from] UploadError),

    /// The first stage failure of the run. Cancellations caused by it are not reported.
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Failed to queue import work: {0}")]
    Seed(#[source] QueueError),

    /// An error occurred while joining a task.
    /// This usually indicates that the task panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Run was cancelled before it finished")]
    Cancelled,
}

impl RunError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}
