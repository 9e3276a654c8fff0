use engine_core::{metrics::MetricsSnapshot, stage::StageReport};
use serde::Serialize;
use tracing::info;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub job: String,
    pub slices: usize,
    pub import_items: usize,
    pub batches: u64,
    pub documents: u64,
    pub bytes: u64,
    pub duration_ms: u64,
    pub stages: Vec<StageReport>,
    pub metrics: MetricsSnapshot,
}

impl RunSummary {
    pub fn log(&self) {
        for stage in &self.stages {
            info!(
                stage = %stage.stage,
                workers = stage.workers,
                items_in = stage.items_in,
                items_out = stage.items_out,
                tasks = stage.tasks_completed,
                "Stage summary"
            );
        }
        info!(
            run_id = %self.run_id,
            job = %self.job,
            batches = self.batches,
            documents = self.documents,
            rows = self.metrics.rows_extracted,
            duration_ms = self.duration_ms,
            "Run completed"
        );
    }
}
