//! Filesystem watcher for the file-backed state store
//!
//! Lets an applier running in a separate process react to documents written
//! by a harvester process sharing the same state directory.

use super::{ChangeNotification, FileStateStore};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Repeated events for the same key inside this window are collapsed
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches a state directory and emits change notifications for written documents
pub struct StoreWatcher {
    root: PathBuf,
    notify_tx: broadcast::Sender<ChangeNotification>,
    debounce: Duration,
}

impl StoreWatcher {
    pub fn new(root: impl Into<PathBuf>, notify_tx: broadcast::Sender<ChangeNotification>) -> Self {
        Self {
            root: root.into(),
            notify_tx,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching; stops when the returned handle is dropped
    pub async fn start(self) -> Result<WatcherHandle> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create state directory {}", self.root.display()))?;

        // Some backends report canonical paths; keys are derived relative to the root
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .with_context(|| format!("Failed to resolve state directory {}", self.root.display()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!(error = %e, "State directory watch error"),
            },
            notify::Config::default(),
        )
        .context("Failed to create filesystem watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        info!(path = %root.display(), "Watching state directory");

        let notify_tx = self.notify_tx.clone();
        let debounce = self.debounce;

        let task = tokio::spawn(async move {
            let mut recent: HashMap<String, Instant> = HashMap::new();

            while let Some(event) = rx.recv().await {
                for key in Self::written_keys(&event, &root) {
                    let now = Instant::now();
                    if let Some(seen) = recent.get(&key) {
                        if now.duration_since(*seen) < debounce {
                            continue;
                        }
                    }
                    recent.insert(key.clone(), now);
                    recent.retain(|_, seen| now.duration_since(*seen) < debounce * 10);

                    debug!(key = %key, "State document written");
                    let _ = notify_tx.send(ChangeNotification::new(key));
                }
            }

            debug!("Watcher channel closed");
        });

        Ok(WatcherHandle {
            _watcher: watcher,
            _task: task,
        })
    }

    /// Keys of documents an event reports as created or modified
    fn written_keys(event: &Event, root: &Path) -> Vec<String> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => event
                .paths
                .iter()
                .filter_map(|path| FileStateStore::key_for_path(root, path))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Handle to a running watcher
/// Stops watching when dropped
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    _task: tokio::task::JoinHandle<()>,
}
