use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bussp_server::cache::TtlCache;
use bussp_server::config::AppConfig;
use bussp_server::location::FixedLocation;
use bussp_server::olhovivo::OlhoVivoClient;
use bussp_server::queries::BusQueries;
use bussp_server::storage::{FileStore, KeyValueStore};
use bussp_server::stores::{FavoritesStore, SearchHistoryStore};
use bussp_server::web::{AppState, create_router};

/// How often expired cache entries are swept (1 hour).
const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bussp_server=info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), BoxError> {
    let config = AppConfig::from_env()?;

    // Persistent storage shared by the cache and the rider stores
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_file).await?);
    info!(path = %config.data_file.display(), "opened data file");

    let cache = TtlCache::new(store.clone(), config.cache.clone());
    match cache.cleanup().await {
        Ok(removed) => info!(removed, "swept expired cache entries"),
        Err(e) => warn!(error = %e, "initial cache cleanup failed"),
    }

    let favorites = FavoritesStore::open(store.clone()).await?;
    let history = SearchHistoryStore::open(store).await?;

    let client = OlhoVivoClient::new(config.olhovivo.clone())?;
    let queries = BusQueries::new(Arc::new(client));
    if !queries.authenticate().await {
        warn!("initial Olho Vivo login failed, will retry on first request");
    }

    let state = AppState::new(
        queries,
        favorites,
        history,
        cache,
        Arc::new(FixedLocation::default()),
    );

    // Spawn background task to sweep expired cache entries
    let cleanup_cache = state.cache.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_CLEANUP_INTERVAL);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            match cleanup_cache.cleanup().await {
                Ok(removed) => info!(removed, "swept expired cache entries"),
                Err(e) => warn!(error = %e, "cache cleanup failed"),
            }
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "BusSP server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
