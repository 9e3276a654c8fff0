use dashmap::DashMap;
use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::OnceCell;

/// Why a key's begin hook did not succeed.
#[derive(Debug)]
pub enum BeginFailure<E> {
    /// This caller ran the hook and it failed.
    Hook(E),
    /// The hook already failed for another caller of the same key.
    Earlier(Arc<str>),
}

/// Lifecycle record of one task key within a consuming stage.
#[derive(Debug, Default)]
struct TaskEntry {
    /// Items of this key that are queued or being handled.
    outstanding: AtomicUsize,
    /// Outcome of the begin hook; the error message when it failed.
    began: OnceCell<Result<(), Arc<str>>>,
    completed: AtomicBool,
}

/// Per-key reference counts shared by the queue feeding a stage and the
/// stage's workers.
///
/// A key is counted up when an item is added to the queue and counted down
/// after a worker finished handling it. `begin` runs once per key before the
/// first handler. A key is ready to complete once its count is zero and the
/// queue is complete; exactly one caller wins the claim for it. The entry is
/// dropped only after the completion hook returned.
#[derive(Debug, Default)]
pub struct TaskTracker {
    entries: DashMap<String, Arc<TaskEntry>>,
    any_began: AtomicBool,
    open_keys: AtomicUsize,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn observe(&self, key: &str) {
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| {
                self.open_keys.fetch_add(1, Ordering::AcqRel);
                Arc::new(TaskEntry::default())
            })
            .clone();
        entry.outstanding.fetch_add(1, Ordering::AcqRel);
    }

    /// Reverts an `observe` whose item never reached the queue.
    pub(crate) fn forget(&self, key: &str) {
        if let Some(entry) = self.get(key) {
            entry.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Runs `hook` once for the key, before any handler of that key proceeds.
    /// Concurrent callers for the same key wait for the first to finish.
    /// The hook receives whether it is the first begin of the whole stage.
    ///
    /// A failed hook is not retried: the caller that ran it gets the error
    /// back, every later caller gets [`BeginFailure::Earlier`].
    pub async fn begin_once<F, Fut, E>(&self, key: &str, hook: F) -> Result<(), BeginFailure<E>>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let Some(entry) = self.get(key) else {
            return Ok(());
        };

        let mut own_failure = None;
        let outcome = entry
            .began
            .get_or_init(|| async {
                let is_first = !self.any_began.swap(true, Ordering::AcqRel);
                hook(is_first).await.map_err(|err| {
                    let message: Arc<str> = Arc::from(err.to_string());
                    own_failure = Some(err);
                    message
                })
            })
            .await;

        match (outcome, own_failure) {
            (Ok(()), _) => Ok(()),
            (Err(_), Some(err)) => Err(BeginFailure::Hook(err)),
            (Err(message), None) => Err(BeginFailure::Earlier(message.clone())),
        }
    }

    /// Marks one item of the key as handled.
    pub fn release(&self, key: &str) {
        if let Some(entry) = self.get(key) {
            entry.outstanding.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Claims the key's completion if nothing of it is outstanding and the
    /// feeding queue is complete. Returns `Some(is_last)` to the one caller
    /// that must run the completion hook.
    pub fn claim_completion(&self, key: &str, input_complete: bool) -> Option<bool> {
        if !input_complete {
            return None;
        }
        let entry = self.get(key)?;
        if entry.outstanding.load(Ordering::Acquire) != 0 {
            return None;
        }
        if entry.completed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.open_keys.fetch_sub(1, Ordering::AcqRel) == 1)
    }

    /// Drops the key's record once its completion hook returned.
    pub fn finish(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Keys with nothing outstanding that have not completed yet.
    pub fn idle_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| {
                e.value().outstanding.load(Ordering::Acquire) == 0
                    && !e.value().completed.load(Ordering::Acquire)
            })
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn outstanding(&self, key: &str) -> usize {
        self.get(key)
            .map_or(0, |e| e.outstanding.load(Ordering::Acquire))
    }

    pub fn open_keys(&self) -> usize {
        self.open_keys.load(Ordering::Acquire)
    }

    fn get(&self, key: &str) -> Option<Arc<TaskEntry>> {
        self.entries.get(key).map(|e| e.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn begin_runs_once_per_key() {
        let tracker = TaskTracker::new();
        tracker.observe("a");
        tracker.observe("a");
        tracker.observe("b");

        let calls = AtomicUsize::new(0);
        let mut firsts = Vec::new();
        for key in ["a", "a", "b"] {
            tracker
                .begin_once(key, |is_first| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    firsts.push(is_first);
                    async { Ok::<_, fmt::Error>(()) }
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(firsts, vec![true, false]);
    }

    #[tokio::test]
    async fn failed_begin_is_not_retried() {
        let tracker = TaskTracker::new();
        tracker.observe("a");
        tracker.observe("a");

        let calls = AtomicUsize::new(0);
        let first = tracker
            .begin_once("a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(fmt::Error) }
            })
            .await;
        assert!(matches!(first, Err(BeginFailure::Hook(fmt::Error))));

        let second = tracker
            .begin_once("a", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, fmt::Error>(()) }
            })
            .await;
        match second {
            Err(BeginFailure::Earlier(message)) => assert_eq!(&*message, fmt::Error.to_string()),
            other => panic!("expected the earlier failure, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn completion_waits_for_input_and_outstanding_items() {
        let tracker = TaskTracker::new();
        tracker.observe("a");
        tracker.observe("b");

        tracker.release("a");
        assert_eq!(tracker.claim_completion("a", false), None);

        assert_eq!(tracker.claim_completion("a", true), Some(false));
        assert_eq!(tracker.claim_completion("a", true), None);
        assert_eq!(tracker.claim_completion("b", true), None);

        tracker.release("b");
        assert_eq!(tracker.idle_keys(), vec!["b".to_string()]);
        assert_eq!(tracker.claim_completion("b", true), Some(true));

        tracker.finish("a");
        tracker.finish("b");
        assert!(tracker.idle_keys().is_empty());
    }

    #[test]
    fn forget_reverts_observe() {
        let tracker = TaskTracker::new();
        tracker.observe("a");
        tracker.forget("a");
        assert_eq!(tracker.outstanding("a"), 0);
    }
}
