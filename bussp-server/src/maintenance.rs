//! Wipe all locally held rider data.

use serde::Serialize;
use tracing::{info, warn};

use crate::cache::TtlCache;
use crate::storage::KeyValueStore;
use crate::stores::{FavoritesStore, SearchHistoryStore};

/// Outcome of each step of [`clear_all_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub cache: Result<(), String>,
    pub favorites: Result<(), String>,
    pub history: Result<(), String>,
}

impl ClearReport {
    /// True when every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.cache.is_ok() && self.favorites.is_ok() && self.history.is_ok()
    }
}

/// Clear the cache namespace, favorites and search history.
///
/// Every step runs even when an earlier one fails.
pub async fn clear_all_data<S: KeyValueStore + ?Sized>(
    cache: &TtlCache<S>,
    favorites: &FavoritesStore,
    history: &SearchHistoryStore,
) -> ClearReport {
    let report = ClearReport {
        cache: cache.clear().await.map_err(|e| e.to_string()),
        favorites: favorites.clear().await.map_err(|e| e.to_string()),
        history: history.clear().await.map_err(|e| e.to_string()),
    };

    if report.is_complete() {
        info!("cleared all local data");
    } else {
        warn!(?report, "clearing local data partially failed");
    }
    report
}
