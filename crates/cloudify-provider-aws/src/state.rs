use std::collections::HashMap;
use std::sync::Arc;

use cloudify_core::{CallId, FunctionReturn};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::ProviderError;
use crate::manifest::ResourcesManifest;

/// Every AWS SDK client handle this provider needs. Each is a cheap,
/// thread-safe, `Clone`-able handle — sharing one across the collector,
/// the DLQ drain, and the dispatch path costs nothing.
#[derive(Clone)]
pub struct Clients {
    pub lambda: aws_sdk_lambda::Client,
    pub iam: aws_sdk_iam::Client,
    pub logs: aws_sdk_cloudwatchlogs::Client,
    pub sqs: aws_sdk_sqs::Client,
    pub sns: aws_sdk_sns::Client,
}

impl Clients {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            lambda: aws_sdk_lambda::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            logs: aws_sdk_cloudwatchlogs::Client::new(config),
            sqs: aws_sdk_sqs::Client::new(config),
            sns: aws_sdk_sns::Client::new(config),
        }
    }
}

/// One call's outcome, handed from the collector (or a cancelling
/// teardown) to the caller awaiting it.
pub type PendingSender = oneshot::Sender<Result<FunctionReturn, ProviderError>>;

/// Table of in-flight queue-mode calls. Non-empty iff the collector task
/// exists or is about to be started — `dispatch.rs` and `collector.rs`
/// are the only two places that touch it, and both go through this type
/// so the "register before publish" / "clear handle atomically with the
/// emptiness check" invariants live in one place.
#[derive(Default)]
pub struct PendingMap {
    inner: Mutex<HashMap<CallId, PendingSender>>,
}

impl PendingMap {
    pub async fn register(&self, call_id: CallId, sender: PendingSender) {
        self.inner.lock().await.insert(call_id, sender);
    }

    pub async fn take(&self, call_id: &CallId) -> Option<PendingSender> {
        self.inner.lock().await.remove(call_id)
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Drain every pending slot and fail each with `Cancelled` — used by
    /// teardown and by the collector when it receives a stop sentinel.
    pub async fn cancel_all(&self) {
        let mut map = self.inner.lock().await;
        for (_, sender) in map.drain() {
            let _ = sender.send(Err(ProviderError::Cancelled));
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, HashMap<CallId, PendingSender>> {
        self.inner.lock().await
    }
}

/// Handle to the single background task currently running, if any.
/// Guarded the same way as `PendingMap` so starting/clearing it can happen
/// in the same locked section as the pending-map emptiness check.
#[derive(Default)]
pub struct TaskSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    pub async fn set(&self, handle: JoinHandle<()>) {
        *self.handle.lock().await = Some(handle);
    }

    /// Take the handle out and wait for the task to finish on its own —
    /// used by teardown after a stop sentinel has been published, so the
    /// task actually reaches its own exit path instead of being cut off
    /// mid-poll.
    pub async fn take_and_join(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().await
    }
}

/// Runtime state threaded through `initialize` → `invoke`* → `cleanup`.
/// Non-serializable by design — everything that needs to survive a process
/// restart lives in `ResourcesManifest` instead (see `manifest.rs`).
pub struct AwsState {
    pub clients: Clients,
    pub manifest: ResourcesManifest,
    pub pending: Arc<PendingMap>,
    pub collector: Arc<TaskSlot>,
    pub dlq_drain: Arc<TaskSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_calls_resolve_to_their_own_call_id() {
        let pending = PendingMap::default();
        let mut receivers = Vec::new();
        let call_ids: Vec<CallId> = (0..8).map(|_| CallId::new()).collect();

        for &call_id in &call_ids {
            let (tx, rx) = oneshot::channel();
            pending.register(call_id, tx).await;
            receivers.push((call_id, rx));
        }

        // Resolve in reverse order, each tagged with its own call_id's
        // value, to make sure correlation isn't accidentally positional.
        for (i, &call_id) in call_ids.iter().enumerate().rev() {
            let sender = pending.take(&call_id).await.unwrap();
            let _ = sender.send(Ok(FunctionReturn::Value {
                value: serde_json::json!(i),
            }));
        }

        for (i, (_, rx)) in receivers.into_iter().enumerate() {
            let result = rx.await.unwrap().unwrap();
            match result {
                FunctionReturn::Value { value } => assert_eq!(value, serde_json::json!(i)),
                _ => panic!("expected value"),
            }
        }
    }

    #[tokio::test]
    async fn cancel_all_rejects_every_pending_slot_without_touching_others() {
        let pending = PendingMap::default();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        let call_a = CallId::new();
        let call_b = CallId::new();
        pending.register(call_a, tx_a).await;
        pending.register(call_b, tx_b).await;

        pending.cancel_all().await;

        assert!(matches!(rx_a.await.unwrap(), Err(ProviderError::Cancelled)));
        assert!(matches!(rx_b.await.unwrap(), Err(ProviderError::Cancelled)));
        assert!(pending.is_empty().await);
    }

    #[tokio::test]
    async fn task_slot_start_is_exclusive_under_concurrent_check_then_set() {
        let slot = Arc::new(TaskSlot::default());
        let started = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let slot = slot.clone();
            let started = started.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = slot.lock().await;
                if guard.is_none() {
                    started.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    *guard = Some(tokio::spawn(async {}));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(started.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(slot.is_running().await);
    }

    #[tokio::test]
    async fn registration_before_publish_means_an_immediate_reply_still_finds_its_slot() {
        // Simulates a trampoline that replies before the caller's publish
        // call returns: register, then resolve, then only afterwards
        // "observe" the publish as having completed.
        let pending = Arc::new(PendingMap::default());
        let call_id = CallId::new();
        let (tx, rx) = oneshot::channel();

        pending.register(call_id, tx).await;

        let resolver_pending = pending.clone();
        let resolver = tokio::spawn(async move {
            let sender = resolver_pending.take(&call_id).await.expect("slot must exist");
            let _ = sender.send(Ok(FunctionReturn::Value {
                value: serde_json::json!("ok"),
            }));
        });
        resolver.await.unwrap();

        // "publish" observed to complete only now.
        let result = rx.await.unwrap().unwrap();
        assert!(matches!(result, FunctionReturn::Value { .. }));
    }
}
