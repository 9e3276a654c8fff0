use crate::{
    context::PipelineContext,
    error::{BoxError, QueueError, StageError},
    metrics::Metrics,
    queue::{
        BoundedWorkQueue, MeteredQueue, WorkItem,
        tracker::{BeginFailure, TaskTracker},
    },
    stage::Stage,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Totals of one stage once every worker exited.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StageReport {
    pub stage: String,
    pub workers: usize,
    pub items_in: u64,
    pub items_out: u64,
    pub tasks_completed: u64,
}

#[derive(Debug, Default)]
struct WorkerCounts {
    items_in: u64,
    items_out: u64,
    tasks_completed: u64,
}

/// Runs `workers` copies of a stage loop over one input queue.
///
/// The output queue is marked complete only after every worker exited
/// normally. A failing or panicking worker cancels the whole run instead.
pub struct StageWorkerPool<S: Stage> {
    stage: Arc<S>,
    workers: usize,
    input: Arc<BoundedWorkQueue<S::Input>>,
    output: Arc<BoundedWorkQueue<S::Output>>,
    cancel: CancellationToken,
    metrics: Metrics,
}

impl<S: Stage> StageWorkerPool<S> {
    pub fn new(
        stage: S,
        input: Arc<BoundedWorkQueue<S::Input>>,
        output: Arc<BoundedWorkQueue<S::Output>>,
        ctx: &PipelineContext,
    ) -> Self {
        let workers = ctx.workers_for(stage.name());
        StageWorkerPool {
            stage: Arc::new(stage),
            workers,
            input,
            output,
            cancel: ctx.cancel_token(),
            metrics: ctx.metrics(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn spawn(self) -> JoinHandle<Result<StageReport, StageError>> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> Result<StageReport, StageError> {
        let name = self.stage.name().to_string();
        info!(stage = %name, workers = self.workers, "Stage started");

        let mut set = JoinSet::new();
        for id in 0..self.workers {
            let worker = Worker {
                id,
                stage: self.stage.clone(),
                input: self.input.clone(),
                output: self.output.clone(),
                metrics: self.metrics.clone(),
            };
            set.spawn(worker.run());
        }

        let mut report = StageReport {
            stage: name.clone(),
            workers: self.workers,
            ..StageReport::default()
        };
        let mut failure: Option<StageError> = None;

        while let Some(joined) = set.join_next().await {
            let outcome = joined.unwrap_or_else(|err| {
                Err(StageError::Panicked {
                    stage: name.clone(),
                    message: panic_message(err),
                })
            });

            match outcome {
                Ok(counts) => {
                    report.items_in += counts.items_in;
                    report.items_out += counts.items_out;
                    report.tasks_completed += counts.tasks_completed;
                }
                Err(err) => {
                    if err.is_cancellation() {
                        debug!(stage = %name, "Worker stopped by cancellation");
                    } else {
                        error!(stage = %name, error = %err, "Worker failed, aborting run");
                        self.metrics.increment_failures(1);
                    }
                    self.cancel.cancel();
                    failure = Some(match failure {
                        Some(existing) if !existing.is_cancellation() => existing,
                        _ => err,
                    });
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }

        self.output.mark_complete();
        info!(
            stage = %name,
            items_in = report.items_in,
            items_out = report.items_out,
            tasks = report.tasks_completed,
            "Stage finished"
        );
        Ok(report)
    }
}

struct Worker<S: Stage> {
    id: usize,
    stage: Arc<S>,
    input: Arc<BoundedWorkQueue<S::Input>>,
    output: Arc<BoundedWorkQueue<S::Output>>,
    metrics: Metrics,
}

impl<S: Stage> Worker<S> {
    async fn run(self) -> Result<WorkerCounts, StageError> {
        let tracker = self.input.tracker().clone();
        let mut counts = WorkerCounts::default();
        trace!(stage = %self.stage.name(), worker = self.id, "Worker started");

        loop {
            let item = match self.input.take().await {
                Ok(item) => item,
                Err(QueueError::EmptyCompleted(_)) => break,
                Err(source) => return Err(self.queue_error(source)),
            };
            counts.items_in += 1;
            self.metrics.record_stage_input(self.stage.name(), 1);

            let key = item.task_key().to_string();
            let handled = self.process(&tracker, &key, item, &mut counts).await;
            tracker.release(&key);
            handled?;

            if let Some(is_last) = tracker.claim_completion(&key, self.input.is_completed()) {
                self.complete(&tracker, &key, is_last, &mut counts).await?;
            }
        }

        // Keys whose last item finished before the input was marked complete.
        for key in tracker.idle_keys() {
            if let Some(is_last) = tracker.claim_completion(&key, true) {
                self.complete(&tracker, &key, is_last, &mut counts).await?;
            }
        }

        trace!(stage = %self.stage.name(), worker = self.id, items = counts.items_in, "Worker exiting");
        Ok(counts)
    }

    async fn process(
        &self,
        tracker: &TaskTracker,
        key: &str,
        item: S::Input,
        counts: &mut WorkerCounts,
    ) -> Result<(), StageError> {
        tracker
            .begin_once(key, |is_first| self.stage.begin(key, is_first))
            .await
            .map_err(|failure| StageError::Begin {
                stage: self.stage.name().to_string(),
                task_key: key.to_string(),
                source: match failure {
                    BeginFailure::Hook(e) => Box::new(e) as BoxError,
                    BeginFailure::Earlier(message) => message.to_string().into(),
                },
            })?;

        let outputs = self
            .stage
            .handle(item)
            .await
            .map_err(|e| StageError::Handle {
                stage: self.stage.name().to_string(),
                task_key: key.to_string(),
                source: Box::new(e),
            })?;

        self.forward(outputs, counts).await
    }

    async fn complete(
        &self,
        tracker: &TaskTracker,
        key: &str,
        is_last: bool,
        counts: &mut WorkerCounts,
    ) -> Result<(), StageError> {
        debug!(stage = %self.stage.name(), task_key = %key, is_last, "Completing task");
        let outputs = self
            .stage
            .complete(key, is_last)
            .await
            .map_err(|e| StageError::Complete {
                stage: self.stage.name().to_string(),
                task_key: key.to_string(),
                source: Box::new(e),
            })?;
        self.forward(outputs, counts).await?;

        tracker.finish(key);
        counts.tasks_completed += 1;
        Ok(())
    }

    async fn forward(
        &self,
        outputs: Vec<S::Output>,
        counts: &mut WorkerCounts,
    ) -> Result<(), StageError> {
        for output in outputs {
            self.output
                .add(output)
                .await
                .map_err(|e| self.queue_error(e))?;
            counts.items_out += 1;
            self.metrics.record_stage_output(self.stage.name(), 1);
        }
        Ok(())
    }

    fn queue_error(&self, source: QueueError) -> StageError {
        StageError::Queue {
            stage: self.stage.name().to_string(),
            source,
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
