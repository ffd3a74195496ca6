//! FIFO lock around account mutations (switch, remove, import).
//!
//! Each operation holds the queue until its own cascades are done. The queue
//! is not reentrant: an operation must never call `run` again on the same
//! queue. Reads do not go through here.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;

/// `tokio::sync::Mutex` grants the lock in request order, which gives the FIFO.
#[derive(Default)]
pub struct AccountMutationQueue {
    lock: Mutex<()>,
    waiting: AtomicUsize,
}

impl AccountMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` once every earlier operation has finished. The queue is
    /// released whatever `op` returns, and on panic.
    pub async fn run<F, Fut, T>(&self, label: &str, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let guard = self.lock.lock().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!("[Accounts] Mutation '{}' acquired the queue", label);

        let out = op().await;
        drop(guard);
        out
    }

    /// Operations waiting behind the current holder.
    pub fn pending(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}
