use engine_core::context::PipelineContext;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Logs queue depths and progress counters every `interval` until the run
/// is cancelled or the handle is aborted.
pub fn spawn(ctx: PipelineContext, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cancel = ctx.cancel_token();
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => report(&ctx),
            }
        }
    })
}

fn report(ctx: &PipelineContext) {
    for depth in ctx.queue_depths() {
        info!(
            queue = %depth.name,
            len = depth.len,
            capacity = depth.capacity,
            completed = depth.completed,
            "Queue depth"
        );
    }

    let snapshot = ctx.metrics().snapshot();
    info!(
        run_id = %ctx.run_id,
        rows = snapshot.rows_extracted,
        documents = snapshot.documents_built,
        batches = snapshot.batches_saved,
        retries = snapshot.retry_count,
        "Progress"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::queue::WorkItem;

    struct Item;

    impl WorkItem for Item {
        fn task_key(&self) -> &str {
            "q1"
        }
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn reports_until_cancelled() {
        let ctx = PipelineContext::new("run-monitor", 4);
        let queue = ctx.create_queue::<Item>("documents");
        queue.add(Item).await.unwrap();

        let handle = spawn(ctx.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.abort("test finished");
        handle.await.unwrap();

        assert!(logs_contain("Queue depth"));
        assert!(logs_contain("queue=documents"));
    }
}
