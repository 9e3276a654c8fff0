use dashmap::DashMap;
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct StageCounters {
    items_in: AtomicU64,
    items_out: AtomicU64,
}

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_extracted: AtomicU64,
    documents_built: AtomicU64,
    batches_saved: AtomicU64,
    bytes_written: AtomicU64,
    failure_count: AtomicU64,
    retry_count: AtomicU64,
    stages: DashMap<String, StageCounters>,
}

/// Run-wide counters shared by every stage. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StageSnapshot {
    pub stage: String,
    pub items_in: u64,
    pub items_out: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub rows_extracted: u64,
    pub documents_built: u64,
    pub batches_saved: u64,
    pub bytes_written: u64,
    pub failure_count: u64,
    pub retry_count: u64,
    pub stages: Vec<StageSnapshot>,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_rows(&self, count: u64) {
        self.inner.rows_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_documents(&self, count: u64) {
        self.inner
            .documents_built
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner.batches_saved.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_bytes(&self, count: u64) {
        self.inner.bytes_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_stage_input(&self, stage: &str, count: u64) {
        self.stage(stage, |c| c.items_in.fetch_add(count, Ordering::Relaxed));
    }

    pub fn record_stage_output(&self, stage: &str, count: u64) {
        self.stage(stage, |c| c.items_out.fetch_add(count, Ordering::Relaxed));
    }

    fn stage<R>(&self, stage: &str, f: impl FnOnce(&StageCounters) -> R) -> R {
        if let Some(counters) = self.inner.stages.get(stage) {
            return f(counters.value());
        }
        let counters = self.inner.stages.entry(stage.to_string()).or_default();
        f(counters.value())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut stages: Vec<StageSnapshot> = self
            .inner
            .stages
            .iter()
            .map(|e| StageSnapshot {
                stage: e.key().clone(),
                items_in: e.value().items_in.load(Ordering::Relaxed),
                items_out: e.value().items_out.load(Ordering::Relaxed),
            })
            .collect();
        stages.sort_by(|a, b| a.stage.cmp(&b.stage));

        MetricsSnapshot {
            rows_extracted: self.inner.rows_extracted.load(Ordering::Relaxed),
            documents_built: self.inner.documents_built.load(Ordering::Relaxed),
            batches_saved: self.inner.batches_saved.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            stages,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
