//! Cache error types.

use crate::storage::StorageError;

/// Errors surfaced by cache writes and scans.
///
/// Reads never fail: an unreadable or undecodable entry is a miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store failed
    #[error("cache storage error: {0}")]
    Storage(#[from] StorageError),

    /// The value could not be serialized
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
