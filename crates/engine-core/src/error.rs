use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of a queue operation that did not yield or accept an item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is drained and no producer will add again. Normal end of input.
    #[error("Queue '{0}' is empty and complete")]
    EmptyCompleted(String),

    /// A producer tried to add after the queue was marked complete.
    #[error("Cannot add to queue '{0}' after it was marked complete")]
    AddAfterComplete(String),

    /// The run was aborted while waiting on the queue.
    #[error("Queue '{0}' operation cancelled")]
    Cancelled(String),
}

/// Failure of one stage of the pipeline.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage '{stage}' failed to begin task '{task_key}': {source}")]
    Begin {
        stage: String,
        task_key: String,
        #[source]
        source: BoxError,
    },

    #[error("Stage '{stage}' failed handling an item of task '{task_key}': {source}")]
    Handle {
        stage: String,
        task_key: String,
        #[source]
        source: BoxError,
    },

    #[error("Stage '{stage}' failed to complete task '{task_key}': {source}")]
    Complete {
        stage: String,
        task_key: String,
        #[source]
        source: BoxError,
    },

    #[error("Stage '{stage}' queue error: {source}")]
    Queue {
        stage: String,
        #[source]
        source: QueueError,
    },

    #[error("Stage '{stage}' worker panicked: {message}")]
    Panicked { stage: String, message: String },
}

impl StageError {
    /// True when the stage stopped only because another part of the run failed or was aborted.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            StageError::Queue {
                source: QueueError::Cancelled(_),
                ..
            }
        )
    }

    pub fn stage(&self) -> &str {
        match self {
            StageError::Begin { stage, .. }
            | StageError::Handle { stage, .. }
            | StageError::Complete { stage, .. }
            | StageError::Queue { stage, .. }
            | StageError::Panicked { stage, .. } => stage,
        }
    }
}
