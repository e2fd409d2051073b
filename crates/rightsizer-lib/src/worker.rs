//! Apply worker
//!
//! Turns state store change notifications into apply runs, one at a time.
//! When the notification channel overflows, the worker lists the store and
//! applies every pending change written since it started, so a burst of
//! writes larger than the channel never loses an apply.

use crate::invocation::{InvocationStatus, Invoker, Trigger};
use crate::store::{list_pending_changes, ChangeNotification, StateStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Counters for a worker's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub applied: u64,
    /// Rejections and client errors (unknown key, resource gone)
    pub client_errors: u64,
    pub server_errors: u64,
    /// Notifications dropped because the worker fell behind
    pub lagged: u64,
    /// Applies triggered by listing the store instead of a notification
    pub resynced: u64,
}

pub struct ApplyWorker {
    invoker: Arc<dyn Invoker>,
    notifications: broadcast::Receiver<ChangeNotification>,
    store: Option<Arc<dyn StateStore>>,
    sweep_on_start: bool,
    started_at: DateTime<Utc>,
    /// Keys applied by the latest resync, with the time it began
    resynced: HashMap<String, DateTime<Utc>>,
}

impl ApplyWorker {
    pub fn new(
        invoker: Arc<dyn Invoker>,
        notifications: broadcast::Receiver<ChangeNotification>,
    ) -> Self {
        Self {
            invoker,
            notifications,
            store: None,
            sweep_on_start: false,
            started_at: Utc::now(),
            resynced: HashMap::new(),
        }
    }

    /// Store listed to recover from dropped notifications
    pub fn with_resync(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Apply every stored pending change once before consuming notifications
    ///
    /// Needs [`with_resync`](Self::with_resync).
    pub fn sweep_on_start(mut self, sweep: bool) -> Self {
        self.sweep_on_start = sweep;
        self
    }

    /// Process notifications until `shutdown` fires or the channel closes
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> WorkerStats {
        info!(resync = self.store.is_some(), "Starting apply worker");
        let mut stats = WorkerStats::default();

        if self.sweep_on_start {
            self.resync(None, &mut stats).await;
        }

        loop {
            tokio::select! {
                received = self.notifications.recv() => match received {
                    Ok(notification) => {
                        if self.covered_by_resync(&notification) {
                            debug!(key = %notification.key, "Already applied by resync");
                            continue;
                        }
                        self.handle(notification, &mut stats).await
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Apply worker lagged, notifications dropped");
                        stats.lagged += skipped;
                        let since = self.started_at;
                        self.resync(Some(since), &mut stats).await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Change notification channel closed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Shutting down apply worker");
                    break;
                }
            }
        }

        stats
    }

    /// Notifications still buffered from before a resync describe writes it already applied
    fn covered_by_resync(&self, notification: &ChangeNotification) -> bool {
        self.resynced
            .get(&notification.key)
            .is_some_and(|began| notification.written_at <= *began)
    }

    /// Apply every pending change updated at or after `since` (all when `None`)
    async fn resync(&mut self, since: Option<DateTime<Utc>>, stats: &mut WorkerStats) {
        let Some(store) = self.store.clone() else {
            warn!("No store to resync from, dropped notifications are lost");
            return;
        };

        let began = Utc::now();
        let changes = match list_pending_changes(store.as_ref(), "").await {
            Ok(changes) => changes,
            Err(e) => {
                error!(error = %e, "Failed to list pending changes for resync");
                return;
            }
        };

        self.resynced.clear();
        for change in changes {
            if since.is_some_and(|since| change.last_updated < since) {
                continue;
            }
            let key = change.key().to_string();
            self.resynced.insert(key.clone(), began);
            stats.resynced += 1;
            self.apply(key, stats).await;
        }

        info!(resynced = self.resynced.len(), "Resynced pending changes from store");
    }

    async fn handle(&self, notification: ChangeNotification, stats: &mut WorkerStats) {
        stats.received += 1;
        debug!(key = %notification.key, written_at = %notification.written_at, "Change notification received");
        self.apply(notification.key, stats).await;
    }

    async fn apply(&self, key: String, stats: &mut WorkerStats) {
        let result = self.invoker.invoke(Trigger::Change { key }).await;

        match result.status() {
            InvocationStatus::Success => stats.applied += 1,
            InvocationStatus::ClientError => stats.client_errors += 1,
            InvocationStatus::ServerError => stats.server_errors += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::InvocationResult;
    use crate::models::{PendingChange, ResourceKind, SizingValue};
    use crate::store::{save_pending_change, InMemoryStateStore};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers by key prefix: `bad/` is a client error, `err/` fails, anything else succeeds
    #[derive(Default)]
    struct KeyedInvoker {
        keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Invoker for KeyedInvoker {
        async fn invoke(&self, trigger: Trigger) -> InvocationResult {
            let Trigger::Change { key } = trigger else {
                return InvocationResult::new(InvocationStatus::ClientError, "unexpected trigger");
            };
            self.keys.lock().unwrap().push(key.clone());
            if key.starts_with("bad/") {
                InvocationResult::new(InvocationStatus::ClientError, "rejected")
            } else if key.starts_with("err/") {
                InvocationResult::new(InvocationStatus::ServerError, "boom")
            } else {
                InvocationResult::success("applied")
            }
        }
    }

    #[tokio::test]
    async fn test_worker_applies_notifications_in_order() {
        let invoker = Arc::new(KeyedInvoker::default());
        let (tx, rx) = broadcast::channel(16);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        for key in ["ok/a", "bad/b", "err/c", "ok/d"] {
            tx.send(ChangeNotification::new(key)).unwrap();
        }
        drop(tx);

        let stats = ApplyWorker::new(invoker.clone(), rx).run(shutdown_rx).await;

        assert_eq!(
            stats,
            WorkerStats {
                received: 4,
                applied: 2,
                client_errors: 1,
                server_errors: 1,
                lagged: 0,
                resynced: 0,
            }
        );
        assert_eq!(
            *invoker.keys.lock().unwrap(),
            vec!["ok/a", "bad/b", "err/c", "ok/d"]
        );
    }

    #[tokio::test]
    async fn test_worker_survives_lag() {
        let invoker = Arc::new(KeyedInvoker::default());
        let (tx, rx) = broadcast::channel(2);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

        for i in 0..5 {
            tx.send(ChangeNotification::new(format!("ok/{}", i))).unwrap();
        }
        drop(tx);

        let stats = ApplyWorker::new(invoker.clone(), rx).run(shutdown_rx).await;

        assert_eq!(stats.lagged, 3);
        assert_eq!(stats.applied, 2);
        assert_eq!(*invoker.keys.lock().unwrap(), vec!["ok/3", "ok/4"]);
    }

    async fn save_function(store: &InMemoryStateStore, name: &str) -> String {
        let change = PendingChange {
            resource_id: name.to_string(),
            resource_kind: ResourceKind::FunctionResource,
            current_value: SizingValue::MemoryMb(1024),
            recommended_value: SizingValue::MemoryMb(512),
            last_updated: Utc::now(),
        };
        save_pending_change(store, &change).await.unwrap().to_string()
    }

    #[tokio::test]
    async fn test_lag_resyncs_changes_written_since_start() {
        let store = Arc::new(InMemoryStateStore::new());
        let old = save_function(&store, "fn-old").await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let invoker = Arc::new(KeyedInvoker::default());
        let (tx, rx) = broadcast::channel(2);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let worker = ApplyWorker::new(invoker.clone(), rx).with_resync(store.clone());

        let mut written = Vec::new();
        for i in 0..5 {
            let key = save_function(&store, &format!("fn-{}", i)).await;
            tx.send(ChangeNotification::new(key.clone())).unwrap();
            written.push(key);
        }
        drop(tx);

        let stats = worker.run(shutdown_rx).await;

        assert_eq!(stats.lagged, 3);
        assert_eq!(stats.resynced, 5);
        // The two buffered notifications were covered by the resync
        assert_eq!(stats.received, 0);
        assert_eq!(stats.applied, 5);

        let applied = invoker.keys.lock().unwrap().clone();
        assert_eq!(applied, written);
        assert!(!applied.contains(&old));
    }

    #[tokio::test]
    async fn test_notification_after_resync_is_applied_again() {
        let store = Arc::new(InMemoryStateStore::new());
        let invoker = Arc::new(KeyedInvoker::default());
        let (tx, rx) = broadcast::channel(1);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let worker = ApplyWorker::new(invoker.clone(), rx).with_resync(store.clone());

        let first = save_function(&store, "fn-a").await;
        tx.send(ChangeNotification::new(first.clone())).unwrap();
        let second = save_function(&store, "fn-b").await;
        tx.send(ChangeNotification::new(second.clone())).unwrap();

        // Rewritten after the resync will have started
        let handle = tokio::spawn(worker.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let rewritten = save_function(&store, "fn-a").await;
        tx.send(ChangeNotification::new(rewritten)).unwrap();
        drop(tx);

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        assert_eq!(stats.lagged, 1);
        assert_eq!(stats.resynced, 2);
        assert_eq!(stats.received, 1);
        assert_eq!(
            *invoker.keys.lock().unwrap(),
            vec![first.clone(), second, first]
        );
    }

    #[tokio::test]
    async fn test_sweep_on_start_applies_existing_changes() {
        let store = Arc::new(InMemoryStateStore::new());
        let a = save_function(&store, "fn-a").await;
        let b = save_function(&store, "fn-b").await;

        let invoker = Arc::new(KeyedInvoker::default());
        let (tx, rx) = broadcast::channel::<ChangeNotification>(4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        drop(tx);

        let stats = ApplyWorker::new(invoker.clone(), rx)
            .with_resync(store)
            .sweep_on_start(true)
            .run(shutdown_rx)
            .await;

        assert_eq!(stats.resynced, 2);
        assert_eq!(stats.applied, 2);
        assert_eq!(*invoker.keys.lock().unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let invoker = Arc::new(KeyedInvoker::default());
        let (_tx, rx) = broadcast::channel::<ChangeNotification>(4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(ApplyWorker::new(invoker, rx).run(shutdown_rx));
        shutdown_tx.send(()).unwrap();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(stats.received, 0);
    }
}
