use crate::{
    metrics::Metrics,
    queue::{BoundedWorkQueue, MeteredQueue, WorkItem},
};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Process-wide, monotonically increasing batch number. The first call to
/// `next` returns 1.
#[derive(Debug, Clone, Default)]
pub struct BatchCounter(Arc<AtomicU64>);

impl BatchCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueDepth {
    pub name: String,
    pub len: usize,
    pub capacity: usize,
    pub completed: bool,
}

/// Everything a run shares across its stages: the cancellation token, the
/// batch counter, metrics and the queues created for the run.
#[derive(Clone)]
pub struct PipelineContext {
    pub run_id: String,
    cancel: CancellationToken,
    metrics: Metrics,
    batches: BatchCounter,
    queue_capacity: usize,
    workers: Arc<HashMap<String, usize>>,
    queues: Arc<RwLock<Vec<Arc<dyn MeteredQueue>>>>,
}

impl PipelineContext {
    pub fn new(run_id: impl Into<String>, queue_capacity: usize) -> Self {
        PipelineContext {
            run_id: run_id.into(),
            cancel: CancellationToken::new(),
            metrics: Metrics::new(),
            batches: BatchCounter::new(),
            queue_capacity: queue_capacity.max(1),
            workers: Arc::new(HashMap::new()),
            queues: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Ties the run to an outer token. Cancelling `parent` aborts the run,
    /// aborting the run leaves `parent` untouched. Call before creating queues.
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Worker count per stage name. Stages not listed run one worker.
    pub fn with_workers<I, S>(mut self, workers: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        self.workers = Arc::new(
            workers
                .into_iter()
                .map(|(stage, n)| (stage.into(), n.max(1)))
                .collect(),
        );
        self
    }

    pub fn workers_for(&self, stage: &str) -> usize {
        self.workers.get(stage).copied().unwrap_or(1)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stops every stage of the run. Idempotent.
    pub fn abort(&self, reason: &str) {
        if !self.cancel.is_cancelled() {
            warn!(run_id = %self.run_id, reason, "Aborting pipeline");
        }
        self.cancel.cancel();
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.clone()
    }

    pub fn batch_counter(&self) -> BatchCounter {
        self.batches.clone()
    }

    /// Creates a queue bound to this run's token and registers it for monitoring.
    pub fn create_queue<T: WorkItem>(&self, name: &str) -> Arc<BoundedWorkQueue<T>> {
        let queue = Arc::new(BoundedWorkQueue::new(
            name,
            self.queue_capacity,
            self.cancel.clone(),
        ));
        let erased: Arc<dyn MeteredQueue> = queue.clone();
        self.queues
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(erased);
        queue
    }

    pub fn queue_depths(&self) -> Vec<QueueDepth> {
        self.queues
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|q| QueueDepth {
                name: q.name().to_string(),
                len: q.len(),
                capacity: q.capacity(),
                completed: q.is_completed(),
            })
            .collect()
    }
}
