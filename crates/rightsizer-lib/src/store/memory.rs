//! In-memory state store

use super::{ChangeNotification, StateStore, NOTIFICATION_CHANNEL_CAPACITY};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// State store held entirely in memory
pub struct InMemoryStateStore {
    values: DashMap<String, serde_json::Value>,
    notifications: broadcast::Sender<ChangeNotification>,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            values: DashMap::new(),
            notifications,
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }

        self.values.insert(key.to_string(), value);
        debug!(key = %key, "Stored value");

        // No subscribers is fine
        let _ = self.notifications.send(ChangeNotification::new(key));
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifications.subscribe()
    }
}
