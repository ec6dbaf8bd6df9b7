//! Rider store error types.

use uuid::Uuid;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed
    #[error("store storage error: {0}")]
    Storage(#[from] StorageError),

    /// State could not be serialized
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No item has the given ID
    #[error("no item with id {0}")]
    NotFound(Uuid),

    /// A search query was blank after trimming
    #[error("search query is empty")]
    EmptyQuery,
}
