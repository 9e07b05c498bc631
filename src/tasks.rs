use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::error;

/// Queue for best-effort side-effect work spawned after a primary
/// create/update response is already on its way back to the caller:
/// attachment upload/delete, issue-link rewiring, transition application.
///
/// Each task catches and logs its own failure; a failing task never aborts
/// its siblings. Production callers do not await; tests call [`drain`] to
/// make side effects deterministic.
///
/// [`drain`]: TaskQueue::drain
#[derive(Debug, Default)]
pub struct TaskQueue {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` without awaiting it. The task's error, if any, is
    /// logged under `label` and swallowed.
    pub fn spawn<F, E>(&self, label: &'static str, task: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(err) = task.await {
                error!(task = label, %err, "background task failed");
            }
        });
        self.handles.lock().unwrap().push(handle);
    }

    /// Awaits every task spawned so far. Panicked tasks are logged and
    /// otherwise ignored, matching the fire-and-forget contract.
    pub async fn drain(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().unwrap());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(%err, "background task panicked");
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn drain_awaits_spawned_work() {
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = counter.clone();
            queue.spawn("count", async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), std::io::Error>(())
            });
        }
        queue.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn failing_task_does_not_abort_siblings() {
        let queue = TaskQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        queue.spawn("fails", async move {
            Err(std::io::Error::other("upload rejected"))
        });
        let sibling = counter.clone();
        queue.spawn("succeeds", async move {
            sibling.fetch_add(1, Ordering::SeqCst);
            Ok::<(), std::io::Error>(())
        });
        queue.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
