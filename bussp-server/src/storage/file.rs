//! File-backed key-value store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{KeyValueStore, StorageError};

/// Key-value store persisted as a single JSON object on disk.
///
/// The whole map is held in memory and the file is rewritten after every
/// mutation (write to a sibling temp file, then rename). Suitable for the
/// few hundred keys a rider's device holds, not for bulk data.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents.
    ///
    /// A missing file opens as an empty store. Parent directories are
    /// created on first write.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| StorageError::Corrupt {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = data.len(), "opened file store");

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Get the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string(data).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut guard = self.data.write().await;
        let mut next = guard.clone();
        next.insert(key.to_string(), value);

        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.multi_remove(&[key.to_string()]).await
    }

    async fn all_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.read().await.keys().cloned().collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut guard = self.data.write().await;
        if !keys.iter().any(|key| guard.contains_key(key)) {
            return Ok(());
        }

        let mut next = guard.clone();
        for key in keys {
            next.remove(key);
        }

        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("data.json")).await.unwrap();
        assert!(store.all_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            store.set("a", "1".into()).await.unwrap();
            store.set("b", "2".into()).await.unwrap();
            store.remove("a").await.unwrap();
        }

        let store = FileStore::open(&path).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("data.json");
        let store = FileStore::open(&path).await.unwrap();

        store.set("a", "1".into()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "not json").unwrap();

        let result = FileStore::open(&path).await;
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn multi_remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileStore::open(&path).await.unwrap();
        for key in ["x", "y", "z"] {
            store.set(key, key.to_string()).await.unwrap();
        }

        store
            .multi_remove(&["x".to_string(), "y".to_string()])
            .await
            .unwrap();

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.all_keys().await.unwrap(), vec!["z".to_string()]);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileStore::open(&path).await.unwrap();
        store.set("a", "1".into()).await.unwrap();
        store.set("b", "2".into()).await.unwrap();

        // A directory where the temp file goes makes every write fail
        std::fs::create_dir(dir.path().join("data.json.tmp")).unwrap();

        assert!(store.set("c", "3".into()).await.is_err());
        assert!(store.remove("a").await.is_err());
        assert!(store.multi_remove(&["a".to_string(), "b".to_string()]).await.is_err());

        assert_eq!(store.all_keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
        let on_disk = FileStore::open(&path).await.unwrap();
        assert_eq!(on_disk.all_keys().await.unwrap(), vec!["a".to_string(), "b".to_string()]);
    }
}
