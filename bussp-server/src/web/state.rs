//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::location::LocationProvider;
use crate::queries::BusQueries;
use crate::storage::KeyValueStore;
use crate::stores::{FavoritesStore, SearchHistoryStore};

/// Shared application state.
///
/// Contains all the services needed to handle requests.
#[derive(Clone)]
pub struct AppState {
    /// Cached Olho Vivo queries
    pub queries: Arc<BusQueries>,

    pub favorites: Arc<FavoritesStore>,

    pub history: Arc<SearchHistoryStore>,

    /// Persistent TTL cache
    pub cache: Arc<TtlCache<dyn KeyValueStore>>,

    /// Fallback position for nearby stop searches
    pub location: Arc<dyn LocationProvider>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(
        queries: BusQueries,
        favorites: FavoritesStore,
        history: SearchHistoryStore,
        cache: TtlCache<dyn KeyValueStore>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            queries: Arc::new(queries),
            favorites: Arc::new(favorites),
            history: Arc::new(history),
            cache: Arc::new(cache),
            location,
        }
    }
}
