//! Persistent key-value storage.
//!
//! A small string-to-string store with the operations the cache and the
//! rider stores need. [`FileStore`] keeps everything in one JSON file;
//! [`MemoryStore`] is the in-process equivalent used by tests and by
//! ephemeral deployments.

mod error;
mod file;
mod memory;

pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// String key-value store.
///
/// Single-key operations are atomic. There are no multi-key transactions:
/// `multi_remove` may remove a prefix of its keys before failing.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn all_keys(&self) -> Result<Vec<String>, StorageError>;

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError>;
}
