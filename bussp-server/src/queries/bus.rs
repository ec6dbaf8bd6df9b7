//! Bus data queries.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use moka::future::Cache as MokaCache;
use tracing::{debug, warn};

use crate::location::Coordinates;
use crate::olhovivo::convert::{process_line, process_position, process_stop, with_distances};
use crate::olhovivo::{
    OlhoVivoClient, OlhoVivoError, ProcessedBusLine, ProcessedBusPosition, ProcessedBusStop,
    StopPrediction,
};

use super::policy::QueryPolicy;
use super::poll::{Poll, poll};

/// Query failures are shared between every caller waiting on the same key.
pub type QueryError = Arc<OlhoVivoError>;

pub type QueryResult<T> = Result<Arc<T>, QueryError>;

/// Default pause before the first retry.
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Minimum trimmed length of a search term.
const MIN_SEARCH_LEN: usize = 2;

/// Nearby-stop cache key: coordinate bit patterns.
type CoordKey = (u64, u64);

fn cache<K, V>(policy: QueryPolicy) -> MokaCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    MokaCache::builder()
        .time_to_live(policy.stale_time)
        .max_capacity(policy.max_capacity)
        .build()
}

/// Olho Vivo client with per-operation freshness and retry policies.
///
/// Concurrent requests for the same key share one upstream fetch.
pub struct BusQueries {
    client: Arc<OlhoVivoClient>,
    retry_interval: Duration,
    lines: MokaCache<String, Arc<Vec<ProcessedBusLine>>>,
    stops: MokaCache<String, Arc<Vec<ProcessedBusStop>>>,
    positions: MokaCache<i64, Arc<Vec<ProcessedBusPosition>>>,
    nearby: MokaCache<CoordKey, Arc<Vec<ProcessedBusStop>>>,
    predictions: MokaCache<(i64, Option<i64>), Arc<StopPrediction>>,
    routes: MokaCache<i64, Arc<serde_json::Value>>,
}

impl BusQueries {
    pub fn new(client: Arc<OlhoVivoClient>) -> Self {
        Self {
            client,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            lines: cache(QueryPolicy::SEARCH_LINES),
            stops: cache(QueryPolicy::SEARCH_LINES),
            positions: cache(QueryPolicy::POSITIONS),
            nearby: cache(QueryPolicy::NEARBY_STOPS),
            predictions: cache(QueryPolicy::STOP_PREDICTIONS),
            routes: cache(QueryPolicy::LINE_ROUTE),
        }
    }

    /// Set the pause before the first retry (later retries back off
    /// exponentially).
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Access the underlying client for operations that bypass the caches.
    pub fn client(&self) -> &Arc<OlhoVivoClient> {
        &self.client
    }

    /// Search lines. Terms shorter than two characters return nothing.
    pub async fn search_lines(&self, query: &str) -> QueryResult<Vec<ProcessedBusLine>> {
        let query = query.trim().to_string();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Arc::new(Vec::new()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.lines
            .try_get_with(query.clone(), async move {
                let lines = with_retries(QueryPolicy::SEARCH_LINES.retries, retry_interval, || {
                    let client = client.clone();
                    let query = query.clone();
                    async move { client.search_lines(&query).await }
                })
                .await?;
                Ok::<_, OlhoVivoError>(Arc::new(lines.into_iter().map(process_line).collect()))
            })
            .await
    }

    /// Search stops by name or address, under the line-search policy.
    pub async fn search_stops(&self, query: &str) -> QueryResult<Vec<ProcessedBusStop>> {
        let query = query.trim().to_string();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Arc::new(Vec::new()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.stops
            .try_get_with(query.clone(), async move {
                let stops = with_retries(QueryPolicy::SEARCH_LINES.retries, retry_interval, || {
                    let client = client.clone();
                    let query = query.clone();
                    async move { client.search_stops(&query).await }
                })
                .await?;
                Ok::<_, OlhoVivoError>(Arc::new(stops.into_iter().map(process_stop).collect()))
            })
            .await
    }

    /// Vehicles on a line. Non-positive line codes return nothing.
    pub async fn positions(&self, line_code: i64) -> QueryResult<Vec<ProcessedBusPosition>> {
        if line_code <= 0 {
            return Ok(Arc::new(Vec::new()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.positions
            .try_get_with(line_code, async move {
                let positions = with_retries(QueryPolicy::POSITIONS.retries, retry_interval, || {
                    let client = client.clone();
                    async move { client.positions(line_code).await }
                })
                .await?;
                Ok::<_, OlhoVivoError>(Arc::new(
                    positions
                        .vs
                        .into_iter()
                        .map(|p| process_position(p, line_code))
                        .collect(),
                ))
            })
            .await
    }

    /// Stops near a coordinate, nearest first. A zero coordinate means "no
    /// fix yet" and returns nothing.
    pub async fn nearby_stops(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> QueryResult<Vec<ProcessedBusStop>> {
        if latitude == 0.0 || longitude == 0.0 {
            return Ok(Arc::new(Vec::new()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.nearby
            .try_get_with((latitude.to_bits(), longitude.to_bits()), async move {
                let stops = with_retries(QueryPolicy::NEARBY_STOPS.retries, retry_interval, || {
                    let client = client.clone();
                    async move { client.nearby_stops(latitude, longitude).await }
                })
                .await?;
                let mut stops: Vec<_> = stops.into_iter().map(process_stop).collect();
                with_distances(&mut stops, Coordinates::new(latitude, longitude));
                Ok::<_, OlhoVivoError>(Arc::new(stops))
            })
            .await
    }

    /// Arrival predictions at a stop. Non-positive stop codes return an
    /// empty prediction.
    pub async fn stop_predictions(&self, stop_code: i64) -> QueryResult<StopPrediction> {
        if stop_code <= 0 {
            return Ok(Arc::new(StopPrediction::default()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.predictions
            .try_get_with((stop_code, None), async move {
                let prediction =
                    with_retries(QueryPolicy::STOP_PREDICTIONS.retries, retry_interval, || {
                        let client = client.clone();
                        async move { client.stop_predictions(stop_code).await }
                    })
                    .await?;
                Ok::<_, OlhoVivoError>(Arc::new(prediction))
            })
            .await
    }

    /// Arrival predictions for one line at a stop.
    pub async fn line_predictions(
        &self,
        line_code: i64,
        stop_code: i64,
    ) -> QueryResult<StopPrediction> {
        if line_code <= 0 || stop_code <= 0 {
            return Ok(Arc::new(StopPrediction::default()));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.predictions
            .try_get_with((stop_code, Some(line_code)), async move {
                let prediction =
                    with_retries(QueryPolicy::STOP_PREDICTIONS.retries, retry_interval, || {
                        let client = client.clone();
                        async move { client.line_predictions(line_code, stop_code).await }
                    })
                    .await?;
                Ok::<_, OlhoVivoError>(Arc::new(prediction))
            })
            .await
    }

    /// Route details for a line. Non-positive line codes return `null`.
    pub async fn line_route(&self, line_code: i64) -> QueryResult<serde_json::Value> {
        if line_code <= 0 {
            return Ok(Arc::new(serde_json::Value::Null));
        }

        let client = self.client.clone();
        let retry_interval = self.retry_interval;
        self.routes
            .try_get_with(line_code, async move {
                let route = with_retries(QueryPolicy::LINE_ROUTE.retries, retry_interval, || {
                    let client = client.clone();
                    async move { client.line_route(line_code).await }
                })
                .await?;
                Ok::<_, OlhoVivoError>(Arc::new(route))
            })
            .await
    }

    /// Log in explicitly. On success, cached searches, positions and nearby
    /// stops are dropped so they refetch under the new session.
    pub async fn authenticate(&self) -> bool {
        let ok = self.client.authenticate().await;
        if ok {
            self.on_authenticated();
        }
        ok
    }

    pub fn on_authenticated(&self) {
        self.lines.invalidate_all();
        self.positions.invalidate_all();
        self.nearby.invalidate_all();
    }

    /// Drop every cached result.
    pub fn invalidate_all(&self) {
        self.lines.invalidate_all();
        self.stops.invalidate_all();
        self.positions.invalidate_all();
        self.nearby.invalidate_all();
        self.predictions.invalidate_all();
        self.routes.invalidate_all();
    }

    /// Poll a line's positions on its refetch interval.
    pub fn watch_positions(self: &Arc<Self>, line_code: i64) -> Poll<Vec<ProcessedBusPosition>> {
        let queries = Arc::clone(self);
        let interval = QueryPolicy::POSITIONS
            .refetch_interval
            .unwrap_or(QueryPolicy::POSITIONS.stale_time);

        poll(interval, move || {
            let queries = queries.clone();
            async move {
                queries.positions.invalidate(&line_code).await;
                queries.positions(line_code).await
            }
        })
    }

    /// Poll a stop's predictions on its refetch interval.
    pub fn watch_predictions(self: &Arc<Self>, stop_code: i64) -> Poll<StopPrediction> {
        let queries = Arc::clone(self);
        let interval = QueryPolicy::STOP_PREDICTIONS
            .refetch_interval
            .unwrap_or(QueryPolicy::STOP_PREDICTIONS.stale_time);

        poll(interval, move || {
            let queries = queries.clone();
            async move {
                queries.predictions.invalidate(&(stop_code, None)).await;
                queries.stop_predictions(stop_code).await
            }
        })
    }
}

/// Run `op`, retrying retryable failures up to `retries` extra times with
/// exponential backoff.
async fn with_retries<T, F, Fut>(
    retries: u32,
    initial_interval: Duration,
    mut op: F,
) -> Result<T, OlhoVivoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OlhoVivoError>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(initial_interval)
        .with_max_interval(Duration::from_secs(10))
        .with_max_elapsed_time(None)
        .build();

    let mut attempt = 0u32;
    backoff::future::retry(policy, || {
        attempt += 1;
        let this_attempt = attempt;
        let fut = op();
        async move {
            fut.await.map_err(|e| {
                if e.is_retryable() && this_attempt <= retries {
                    warn!(attempt = this_attempt, error = %e, "query failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    debug!(attempt = this_attempt, error = %e, "query failed");
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}
