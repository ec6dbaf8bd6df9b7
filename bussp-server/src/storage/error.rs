//! Storage error types.

/// Errors from a [`KeyValueStore`](super::KeyValueStore).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but is not a JSON object of strings
    #[error("storage file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },

    /// The store refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
