//! Single-slot debounced rebuild queue.
//!
//! Change notifications arrive in bursts (an editor save touches several
//! files). Requests made within the debounce window are coalesced, and while
//! a rebuild runs, any number of new requests collapse into exactly one
//! pending rebuild that starts after the current one finishes. Rebuilds never
//! overlap.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Handle to a background rebuild worker.
///
/// Dropping the queue stops the worker; a rebuild in flight is aborted at its
/// next await point.
#[derive(Debug)]
pub struct RebuildQueue {
    pending: Arc<Notify>,
    completed: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl RebuildQueue {
    /// Start a worker that runs `rebuild` for each coalesced request.
    pub fn spawn<F, Fut>(debounce: Duration, mut rebuild: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let pending = Arc::new(Notify::new());
        let completed = Arc::new(AtomicUsize::new(0));

        let worker = {
            let pending = Arc::clone(&pending);
            let completed = Arc::clone(&completed);
            tokio::spawn(async move {
                loop {
                    // Notify stores at most one permit: that's the slot.
                    pending.notified().await;

                    while tokio::time::timeout(debounce, pending.notified())
                        .await
                        .is_ok()
                    {
                        tracing::trace!("Rebuild request coalesced");
                    }

                    rebuild().await;
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        Self {
            pending,
            completed,
            worker,
        }
    }

    /// Ask for a rebuild. Never blocks and never queues more than one.
    pub fn request(&self) {
        self.pending.notify_one();
    }

    /// Number of rebuilds finished so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

impl Drop for RebuildQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
