//! Fire-and-forget execution of background refreshes

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::warn;

/// A detached unit of background work
pub type RefreshTask = BoxFuture<'static, ()>;

/// Runs background refreshes without the caller awaiting them
pub trait RefreshScheduler: Send + Sync {
    fn schedule(&self, task: RefreshTask);
}

/// Spawns each task onto the ambient tokio runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl RefreshScheduler for TokioScheduler {
    fn schedule(&self, task: RefreshTask) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => warn!("No tokio runtime available, dropping background refresh"),
        }
    }
}

/// Queues tasks until [`run_pending`](Self::run_pending) is called.
///
/// Gives tests exact control over when a scheduled refresh lands.
#[derive(Default)]
pub struct DeferredScheduler {
    queue: Mutex<VecDeque<RefreshTask>>,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued tasks one after another, including any they schedule.
    /// Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl RefreshScheduler for DeferredScheduler {
    fn schedule(&self, task: RefreshTask) {
        self.queue.lock().push_back(task);
    }
}
