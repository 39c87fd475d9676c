use super::error::FetchError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

type Outcome = Arc<dyn Any + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, Outcome>>;

/// Request coalescing.
///
/// When several callers ask for the same key while a fetch is already
/// running, only the first fetch executes and every caller receives its
/// result (success or failure). The fetch runs on its own task, so it runs to
/// completion even if all callers go away.
#[derive(Default)]
pub struct RequestDeduplicator {
    in_flight: Arc<Mutex<HashMap<String, InFlight>>>,
    total: AtomicU64,
    deduped: AtomicU64,
}

/// Coalescing counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupStats {
    /// Calls to `run`
    pub total: u64,
    /// Calls served by an already in-flight fetch
    pub deduped: u64,
    /// Fetches currently running
    pub in_flight: usize,
    /// `deduped / total` as a percentage
    pub savings_percent: f64,
}

impl RequestDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fetch` for `key`, or join the fetch already running for it
    pub async fn run<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, FetchError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        self.total.fetch_add(1, Ordering::Relaxed);

        let pending = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(key) {
                Some(existing) => {
                    self.deduped.fetch_add(1, Ordering::Relaxed);
                    debug!(key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let pending = self.start(key, fetch());
                    in_flight.insert(key.to_string(), pending.clone());
                    pending
                }
            }
        };

        let outcome = pending.await;
        match outcome.downcast_ref::<Result<T, FetchError>>() {
            Some(result) => result.clone(),
            None => Err(FetchError::Other(format!(
                "in-flight fetch for {key} produced a different type"
            ))),
        }
    }

    /// Spawn the fetch. The task clears its own registry slot when done, which
    /// blocks on the registry lock the caller still holds until the slot is
    /// inserted.
    fn start<T, Fut>(&self, key: &str, fut: Fut) -> InFlight
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let registry = Arc::clone(&self.in_flight);
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            let result = fut.await;
            registry.lock().remove(&owned_key);
            result
        });

        async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(FetchError::Other(format!("fetch task failed: {err}"))),
            };
            Arc::new(result) as Outcome
        }
        .boxed()
        .shared()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> DedupStats {
        let total = self.total.load(Ordering::Relaxed);
        let deduped = self.deduped.load(Ordering::Relaxed);
        let savings_percent = if total == 0 {
            0.0
        } else {
            deduped as f64 / total as f64 * 100.0
        };

        DedupStats {
            total,
            deduped,
            in_flight: self.in_flight.lock().len(),
            savings_percent,
        }
    }
}
