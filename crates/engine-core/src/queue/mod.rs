use crate::{error::QueueError, queue::tracker::TaskTracker};
use async_channel::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

pub mod tracker;

/// Anything that flows through a stage. The task key groups items for the
/// per-key begin/complete hooks of the consuming stage.
pub trait WorkItem: Send + 'static {
    fn task_key(&self) -> &str;
}

/// Type-erased view of a queue for monitoring and abort handling.
pub trait MeteredQueue: Send + Sync {
    fn name(&self) -> &str;
    fn capacity(&self) -> usize;
    /// Point-in-time depth. Never use it to decide whether to take.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn is_completed(&self) -> bool;
    fn mark_complete(&self);
}

/// Bounded multi-producer multi-consumer queue between two stages.
///
/// `add` waits while the queue is full and `take` waits while it is empty and
/// not complete. Once complete and drained, `take` yields
/// [`QueueError::EmptyCompleted`]. Every wait also ends with
/// [`QueueError::Cancelled`] when the run's token is cancelled.
pub struct BoundedWorkQueue<T: WorkItem> {
    name: String,
    capacity: usize,
    tx: Sender<T>,
    rx: Receiver<T>,
    tracker: Arc<TaskTracker>,
    cancel: CancellationToken,
}

impl<T: WorkItem> BoundedWorkQueue<T> {
    pub fn new(name: impl Into<String>, capacity: usize, cancel: CancellationToken) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = async_channel::bounded(capacity);
        BoundedWorkQueue {
            name: name.into(),
            capacity,
            tx,
            rx,
            tracker: Arc::new(TaskTracker::new()),
            cancel,
        }
    }

    /// Per-key bookkeeping for items that passed through this queue.
    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    pub async fn add(&self, item: T) -> Result<(), QueueError> {
        if self.tx.is_closed() {
            return Err(self.rejected_add());
        }

        // Counted before it becomes visible so the key cannot look finished in between.
        let key = item.task_key().to_string();
        self.tracker.observe(&key);

        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled(self.name.clone())),
            sent = self.tx.send(item) => sent.map_err(|_| self.rejected_add()),
        };

        if sent.is_err() {
            self.tracker.forget(&key);
        }
        sent
    }

    pub async fn take(&self) -> Result<T, QueueError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled(self.name.clone())),
            item = self.rx.recv() => item.map_err(|_| QueueError::EmptyCompleted(self.name.clone())),
        }
    }

    /// Non-blocking take. `None` when nothing is queued right now.
    pub fn try_take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }

    fn rejected_add(&self) -> QueueError {
        error!(queue = %self.name, "Attempted to add an item after the queue was marked complete");
        QueueError::AddAfterComplete(self.name.clone())
    }
}

impl<T: WorkItem> MeteredQueue for BoundedWorkQueue<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.rx.len()
    }

    fn is_completed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Idempotent. Items already queued stay takeable.
    fn mark_complete(&self) {
        self.tx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    struct Item(&'static str);

    impl WorkItem for Item {
        fn task_key(&self) -> &str {
            self.0
        }
    }

    fn queue(capacity: usize) -> BoundedWorkQueue<Item> {
        BoundedWorkQueue::new("test", capacity, CancellationToken::new())
    }

    #[tokio::test]
    async fn take_drains_then_reports_completion() {
        let q = queue(4);
        q.add(Item("a")).await.unwrap();
        q.add(Item("b")).await.unwrap();
        q.mark_complete();
        q.mark_complete();

        assert_eq!(q.take().await.unwrap(), Item("a"));
        assert_eq!(q.take().await.unwrap(), Item("b"));
        assert_eq!(
            q.take().await.unwrap_err(),
            QueueError::EmptyCompleted("test".to_string())
        );
    }

    #[tokio::test]
    async fn add_after_complete_fails_loudly() {
        let q = queue(4);
        q.mark_complete();
        assert_eq!(
            q.add(Item("a")).await.unwrap_err(),
            QueueError::AddAfterComplete("test".to_string())
        );
        assert_eq!(q.tracker().outstanding("a"), 0);
    }

    #[tokio::test]
    async fn try_take_does_not_block() {
        let q = queue(1);
        assert!(q.try_take().is_none());
        q.add(Item("a")).await.unwrap();
        assert_eq!(q.try_take(), Some(Item("a")));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn full_queue_blocks_second_add_until_take() {
        let q = Arc::new(queue(1));
        q.add(Item("first")).await.unwrap();

        let producer = {
            let q = q.clone();
            tokio::spawn(async move { q.add(Item("second")).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());
        assert_eq!(q.len(), 1);

        assert_eq!(q.take().await.unwrap(), Item("first"));
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(q.take().await.unwrap(), Item("second"));
    }

    #[tokio::test]
    async fn cancellation_releases_waiting_consumers() {
        let cancel = CancellationToken::new();
        let q = Arc::new(BoundedWorkQueue::<Item>::new("test", 1, cancel.clone()));

        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.take().await })
        };
        cancel.cancel();

        let result = consumer.await.unwrap();
        assert_eq!(result.unwrap_err(), QueueError::Cancelled("test".to_string()));
    }
}
