//! Durable handoff between the harvest and apply phases
//!
//! This module provides:
//! - The `StateStore` trait: point reads, overwriting point writes and
//!   change notifications on every write
//! - An in-memory store for tests and embedding
//! - A file-backed store with one JSON document per key
//! - A filesystem watcher that turns writes by other processes into
//!   change notifications

mod file;
mod memory;
mod watcher;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
pub use watcher::{StoreWatcher, WatcherHandle};

use crate::error::{PipelineError, StoreError};
use crate::models::{ChangeKey, PendingChange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the change notification channel
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 256;

/// Emitted after a value has been written to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub key: String,
    pub written_at: DateTime<Utc>,
}

impl ChangeNotification {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            written_at: Utc::now(),
        }
    }
}

/// Key/value store holding opaque JSON documents
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the value at `key`, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

    /// Write `value` at `key`, replacing any previous value, then notify subscribers
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

    /// List keys starting with `prefix`, sorted
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Subscribe to change notifications for subsequent writes
    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification>;
}

/// Load and decode the pending change stored at `key`
pub async fn load_pending_change(
    store: &dyn StateStore,
    key: &ChangeKey,
) -> Result<Option<PendingChange>, PipelineError> {
    let raw_key = key.to_string();
    let Some(value) = store.get(&raw_key).await? else {
        return Ok(None);
    };

    let change: PendingChange =
        serde_json::from_value(value).map_err(|e| PipelineError::InvalidRecord {
            key: raw_key.clone(),
            reason: e.to_string(),
        })?;

    if change.key() != *key {
        return Err(PipelineError::InvalidRecord {
            key: raw_key,
            reason: format!("record describes {}", change.key()),
        });
    }

    Ok(Some(change))
}

/// Encode and write a pending change at its own key
pub async fn save_pending_change(
    store: &dyn StateStore,
    change: &PendingChange,
) -> Result<ChangeKey, PipelineError> {
    let key = change.key();
    let raw_key = key.to_string();
    let value = serde_json::to_value(change).map_err(|e| StoreError::Serialize {
        key: raw_key.clone(),
        message: e.to_string(),
    })?;

    store.put(&raw_key, value).await?;
    Ok(key)
}

/// Load every pending change under `prefix`, skipping undecodable documents
pub async fn list_pending_changes(
    store: &dyn StateStore,
    prefix: &str,
) -> Result<Vec<PendingChange>, PipelineError> {
    let mut changes = Vec::new();

    for raw_key in store.keys(prefix).await? {
        let Ok(key) = ChangeKey::parse(&raw_key) else {
            continue;
        };
        match load_pending_change(store, &key).await {
            Ok(Some(change)) => changes.push(change),
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %raw_key, error = %e, "Skipping unreadable pending change"),
        }
    }

    Ok(changes)
}
