use crate::queue::WorkItem;
use async_trait::async_trait;

pub mod pool;

pub use pool::{StageReport, StageWorkerPool};

/// One purpose-built step of the pipeline, run by a [`StageWorkerPool`].
///
/// The pool calls the hooks as follows:
///   * `begin` once per task key, before the first `handle` of that key,
///   * `handle` for every item, possibly concurrently for the same key,
///   * `complete` once per task key, after the last `handle` of that key.
///
/// Outputs returned from `handle` and `complete` go to the stage's output queue.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    type Input: WorkItem;
    type Output: WorkItem;
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn begin(&self, _task_key: &str, _is_first: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    async fn handle(&self, item: Self::Input) -> Result<Vec<Self::Output>, Self::Error>;

    async fn complete(
        &self,
        _task_key: &str,
        _is_last: bool,
    ) -> Result<Vec<Self::Output>, Self::Error> {
        Ok(Vec::new())
    }
}
