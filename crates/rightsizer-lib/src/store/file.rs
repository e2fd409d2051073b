//! File-backed state store
//!
//! Each key maps to one JSON document at `{root}/{key}.json`. Writes go to
//! a temporary sibling first and are renamed into place, so readers never
//! observe a partially written document.

use super::{ChangeNotification, StateStore, NOTIFICATION_CHANNEL_CAPACITY};
use crate::error::StoreError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::debug;

const DOCUMENT_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// State store persisting one JSON document per key under a root directory
pub struct FileStateStore {
    root: PathBuf,
    notifications: broadcast::Sender<ChangeNotification>,
}

impl FileStateStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CHANNEL_CAPACITY);
        Self {
            root: root.into(),
            notifications,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto its document path, refusing keys that would escape the root
    pub fn document_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }

        let mut path = self.root.clone();
        let mut segments = key.split('/').peekable();

        while let Some(segment) = segments.next() {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{}.{}", segment, DOCUMENT_EXTENSION));
            }
        }

        Ok(path)
    }

    /// Inverse of [`document_path`](Self::document_path); `None` for foreign files
    pub fn key_for_path(root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let file_name = relative.file_name()?.to_str()?;
        let stem = file_name.strip_suffix(&format!(".{}", DOCUMENT_EXTENSION))?;
        if stem.is_empty() {
            return None;
        }

        let mut segments: Vec<&str> = relative
            .parent()
            .map(|parent| parent.iter().filter_map(|s| s.to_str()).collect())
            .unwrap_or_default();
        segments.push(stem);

        Some(segments.join("/"))
    }

    fn io_error(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.document_path(key)?;

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(key, e)),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::Deserialize {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let path = self.document_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(key, e))?;
        }

        let json = serde_json::to_vec_pretty(&value).map_err(|e| StoreError::Serialize {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let mut temp_path = path.clone().into_os_string();
        temp_path.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_path);

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        file.write_all(&json)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        file.sync_all().await.map_err(|e| Self::io_error(key, e))?;
        drop(file);

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Self::io_error(key, e))?;

        debug!(key = %key, path = %path.display(), "Stored document");

        let _ = self.notifications.send(ChangeNotification::new(key));
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_error(prefix, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_error(prefix, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Self::io_error(prefix, e))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = Self::key_for_path(&self.root, &path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.notifications.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_roundtrip_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store
            .put("DatabaseInstance/db-1", json!({"recommended_value": "db.t3.large"}))
            .await
            .unwrap();

        let on_disk = temp_dir.path().join("DatabaseInstance").join("db-1.json");
        assert!(on_disk.exists());

        let value = store.get("DatabaseInstance/db-1").await.unwrap().unwrap();
        assert_eq!(value["recommended_value"], "db.t3.large");
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        assert!(store.get("ComputeInstance/i-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store.put("ComputeInstance/i-1", json!(1)).await.unwrap();
        store.put("ComputeInstance/i-1", json!(2)).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(temp_dir.path().join("ComputeInstance"))
            .await
            .unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }

        assert_eq!(names, vec!["i-1.json"]);
        assert_eq!(store.get("ComputeInstance/i-1").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        assert!(store.put("../outside", json!(1)).await.is_err());
        assert!(store.put("ComputeInstance//i-1", json!(1)).await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[tokio::test]
    async fn test_keys_walks_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store.put("ComputeInstance/i-1", json!(1)).await.unwrap();
        store.put("AutoscalingGroup/team/web-asg", json!(1)).await.unwrap();
        tokio::fs::write(temp_dir.path().join("README.txt"), "not a document")
            .await
            .unwrap();

        let keys = store.keys("").await.unwrap();
        assert_eq!(keys, vec!["AutoscalingGroup/team/web-asg", "ComputeInstance/i-1"]);
        assert_eq!(store.keys("Compute").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_keys_on_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path().join("not-created"));

        assert!(store.keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_notifies_subscribers() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        let mut rx = store.subscribe();

        store.put("FunctionResource/fn-a", json!(512)).await.unwrap();

        assert_eq!(rx.try_recv().unwrap().key, "FunctionResource/fn-a");
    }

    #[test]
    fn test_key_for_path() {
        let root = Path::new("/state");
        assert_eq!(
            FileStateStore::key_for_path(root, Path::new("/state/ComputeInstance/i-1.json")),
            Some("ComputeInstance/i-1".to_string())
        );
        assert_eq!(
            FileStateStore::key_for_path(root, Path::new("/state/ComputeInstance/i-1.json.tmp")),
            None
        );
        assert_eq!(
            FileStateStore::key_for_path(root, Path::new("/elsewhere/ComputeInstance/i-1.json")),
            None
        );
    }
}
