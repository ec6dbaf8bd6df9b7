//! Rider state persisted in the key-value store.
//!
//! Each store keeps its whole state in memory and writes it back as one
//! JSON document after every mutation. A failed write leaves the in-memory
//! state unchanged.

mod error;
mod favorites;
mod history;

pub use error::StoreError;
pub use favorites::{FAVORITES_KEY, FavoriteLine, FavoriteUpdate, FavoritesStore};
pub use history::{
    HISTORY_KEY, MAX_HISTORY_ITEMS, SearchHistoryItem, SearchHistoryStore, SearchKind,
    SearchResult,
};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::storage::KeyValueStore;

/// Load a document, treating a missing or undecodable one as empty.
async fn load<T: DeserializeOwned + Default>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<T, StoreError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(T::default());
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(key, error = %e, "discarding undecodable stored state");
            Ok(T::default())
        }
    }
}

async fn save<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(value)?;
    store.set(key, json).await?;
    Ok(())
}
