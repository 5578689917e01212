//! Best-effort background task queue
//!
//! Writes enqueue fire-and-forget work here (e.g. pushing a versioned store
//! to its remote). Tasks run one at a time on a tokio worker; failures are
//! logged, never surfaced to the writer. The owning process must call
//! [`Queue::close`] before exit or queued work is lost.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::StoreResult;

/// A queued unit of work
pub type Task = BoxFuture<'static, StoreResult<()>>;

struct Job {
    name: String,
    task: Task,
}

/// Sequential background task queue
#[derive(Clone)]
pub struct Queue {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Job>>>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    pending: Arc<AtomicUsize>,
}

impl Queue {
    /// Create a queue and spawn its worker on the current tokio runtime
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run(receiver, pending.clone()));
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            worker: Arc::new(Mutex::new(Some(worker))),
            pending,
        }
    }

    /// Enqueue a task. Returns false if the queue was already closed.
    pub fn add(&self, name: impl Into<String>, task: Task) -> bool {
        let name = name.into();
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            warn!(task = %name, "queue closed, dropping task");
            return false;
        };
        self.pending.fetch_add(1, Ordering::SeqCst);
        if sender.send(Job { name, task }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Number of tasks enqueued but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop accepting tasks and wait for queued work to drain
    ///
    /// Returns true if every task finished before the timeout.
    pub async fn close(&self, timeout: Duration) -> bool {
        self.sender.lock().take();
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return true;
        };
        match tokio::time::timeout(timeout, worker).await {
            Ok(_) => true,
            Err(_) => {
                warn!(pending = self.pending(), "queue did not drain before timeout");
                false
            }
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("pending", &self.pending())
            .field("closed", &self.sender.lock().is_none())
            .finish()
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<Job>, pending: Arc<AtomicUsize>) {
    while let Some(job) = receiver.recv().await {
        debug!(task = %job.name, "running queued task");
        if let Err(e) = job.task.await {
            warn!(task = %job.name, error = %e, "queued task failed");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use futures::FutureExt;

    #[tokio::test]
    async fn test_queue_runs_tasks_in_order() {
        let queue = Queue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            assert!(queue.add(
                format!("task-{}", i),
                async move {
                    log.lock().push(i);
                    Ok(())
                }
                .boxed(),
            ));
        }

        assert!(queue.close(Duration::from_secs(5)).await);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_queue() {
        let queue = Queue::new();
        let ran = Arc::new(AtomicUsize::new(0));

        queue.add("fails", async { Err(StoreError::Cancelled) }.boxed());
        let counter = ran.clone();
        queue.add(
            "succeeds",
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed(),
        );

        assert!(queue.close(Duration::from_secs(5)).await);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_after_close_is_rejected() {
        let queue = Queue::new();
        assert!(queue.close(Duration::from_secs(1)).await);
        assert!(!queue.add("late", async { Ok(()) }.boxed()));
        // closing twice is fine
        assert!(queue.close(Duration::from_secs(1)).await);
    }
}
