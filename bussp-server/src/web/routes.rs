//! HTTP route handlers.

use std::collections::HashSet;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use uuid::Uuid;

use crate::cache::{CacheError, CacheStats};
use crate::location::{Coordinates, current_location_or_default};
use crate::maintenance::clear_all_data;
use crate::olhovivo::ErrorKind;
use crate::olhovivo::convert::arrivals;
use crate::queries::QueryError;
use crate::stores::{FavoriteLine, FavoriteUpdate, SearchKind, SearchResult, StoreError};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lines/search", get(search_lines))
        .route("/api/lines/:code/positions", get(line_positions))
        .route("/api/lines/:code/route", get(line_route))
        .route("/api/stops/search", get(search_stops))
        .route("/api/stops/nearby", get(nearby_stops))
        .route("/api/stops/:code/predictions", get(stop_predictions))
        .route("/api/favorites", get(list_favorites).post(add_favorite))
        .route("/api/favorites/:id", delete(remove_favorite).patch(update_favorite))
        .route("/api/favorites/:id/notifications", post(toggle_notifications))
        .route("/api/history", get(list_history).delete(clear_history))
        .route("/api/history/recent", get(recent_history))
        .route("/api/history/frequent", get(frequent_history))
        .route("/api/history/:id", delete(remove_history_item))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/cleanup", post(cache_cleanup))
        .route("/api/maintenance/clear", post(clear_data))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Search lines by number or destination, marking favorites.
async fn search_lines(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<LineSearchResponse>, AppError> {
    let found = state.queries.search_lines(&req.q).await?;

    let favorite_codes: HashSet<i64> = state
        .favorites
        .list()
        .await
        .into_iter()
        .map(|fav| fav.line_code)
        .collect();
    let lines: Vec<_> = found
        .iter()
        .cloned()
        .map(|mut line| {
            line.is_favorite = favorite_codes.contains(&line.raw.cl);
            line
        })
        .collect();

    if !lines.is_empty() {
        let picked = match lines.as_slice() {
            [only] => Some(SearchResult::Line(only.clone())),
            _ => None,
        };
        record_search(&state, &req.q, SearchKind::Line, picked).await;
    }

    Ok(Json(LineSearchResponse { lines }))
}

/// Search stops by name or address.
async fn search_stops(
    State(state): State<AppState>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<StopSearchResponse>, AppError> {
    let stops = state.queries.search_stops(&req.q).await?;
    let stops = stops.as_ref().clone();

    if !stops.is_empty() {
        let picked = match stops.as_slice() {
            [only] => Some(SearchResult::Stop(only.clone())),
            _ => None,
        };
        record_search(&state, &req.q, SearchKind::Stop, picked).await;
    }

    Ok(Json(StopSearchResponse { stops }))
}

/// History is a convenience; failing to record a search never fails it.
async fn record_search(
    state: &AppState,
    query: &str,
    kind: SearchKind,
    result: Option<SearchResult>,
) {
    if let Err(e) = state.history.add(query, kind, result).await {
        warn!(query, error = %e, "failed to record search");
    }
}

/// Live vehicle positions for a line.
async fn line_positions(
    State(state): State<AppState>,
    Path(code): Path<i64>,
) -> Result<Json<PositionsResponse>, AppError> {
    let positions = state.queries.positions(code).await?;
    Ok(Json(PositionsResponse {
        line_code: code,
        positions: positions.as_ref().clone(),
    }))
}

/// Route details for a line, as returned upstream.
async fn line_route(
    State(state): State<AppState>,
    Path(code): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let route = state.queries.line_route(code).await?;
    Ok(Json(route.as_ref().clone()))
}

/// Stops near the given coordinate, or near the rider when none is given.
async fn nearby_stops(
    State(state): State<AppState>,
    Query(req): Query<NearbyRequest>,
) -> Result<Json<StopSearchResponse>, AppError> {
    let origin = match (req.lat, req.lng) {
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng),
        (None, None) => current_location_or_default(state.location.as_ref()).await,
        _ => {
            return Err(AppError::BadRequest {
                message: "lat and lng must be given together".to_string(),
            });
        }
    };

    let stops = state
        .queries
        .nearby_stops(origin.latitude, origin.longitude)
        .await?;
    Ok(Json(StopSearchResponse {
        stops: stops.as_ref().clone(),
    }))
}

#[derive(Debug, Deserialize)]
struct PredictionsRequest {
    /// Restrict predictions to one line
    line: Option<i64>,
}

/// Arrival predictions at a stop.
async fn stop_predictions(
    State(state): State<AppState>,
    Path(code): Path<i64>,
    Query(req): Query<PredictionsRequest>,
) -> Result<Json<PredictionsResponse>, AppError> {
    let prediction = match req.line {
        Some(line) => state.queries.line_predictions(line, code).await?,
        None => state.queries.stop_predictions(code).await?,
    };
    Ok(Json(PredictionsResponse {
        arrivals: arrivals(&prediction),
        prediction: prediction.as_ref().clone(),
    }))
}

async fn list_favorites(State(state): State<AppState>) -> Json<FavoritesResponse> {
    Json(FavoritesResponse {
        favorites: state.favorites.list().await,
    })
}

async fn add_favorite(
    State(state): State<AppState>,
    Json(req): Json<AddFavoriteRequest>,
) -> Result<(StatusCode, Json<FavoriteLine>), AppError> {
    if req.line_code <= 0 {
        return Err(AppError::BadRequest {
            message: format!("invalid line code: {}", req.line_code),
        });
    }

    let favorite = state
        .favorites
        .add(req.line_code, req.line_name, req.nickname)
        .await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

async fn update_favorite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<FavoriteUpdate>,
) -> Result<Json<FavoriteLine>, AppError> {
    Ok(Json(state.favorites.update(id, update).await?))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.favorites.remove(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::NotFound(id).into())
    }
}

async fn toggle_notifications(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FavoriteLine>, AppError> {
    Ok(Json(state.favorites.toggle_notifications(id).await?))
}

async fn list_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse::new(state.history.list().await))
}

async fn recent_history(
    State(state): State<AppState>,
    Query(req): Query<LimitRequest>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse::new(state.history.recent(req.limit).await))
}

async fn frequent_history(
    State(state): State<AppState>,
    Query(req): Query<LimitRequest>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse::new(state.history.frequent(req.limit).await))
}

async fn remove_history_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.history.remove(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::NotFound(id).into())
    }
}

async fn clear_history(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.history.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cache_stats(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.cache.stats().await?))
}

async fn cache_cleanup(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let removed = state.cache.cleanup().await?;
    Ok(Json(CleanupResponse { removed }))
}

/// Wipe the cache, favorites and history, and forget in-memory query
/// results.
async fn clear_data(State(state): State<AppState>) -> (StatusCode, Json<ClearResponse>) {
    let report = clear_all_data(state.cache.as_ref(), &state.favorites, &state.history).await;
    state.queries.invalidate_all();

    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ClearResponse::from(&report)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
    Api(QueryError),
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        AppError::Api(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => AppError::NotFound {
                message: e.to_string(),
            },
            StoreError::EmptyQuery => AppError::BadRequest {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Internal {
            message: e.to_string(),
        }
    }
}

impl AppError {
    fn tag(&self) -> ErrorTag {
        match self {
            AppError::BadRequest { .. } => ErrorTag::BadRequest,
            AppError::NotFound { .. } => ErrorTag::NotFound,
            AppError::Internal { .. } => ErrorTag::Internal,
            AppError::Api(e) => ErrorTag::Api(e.kind()),
        }
    }

    fn status(&self) -> StatusCode {
        match self.tag() {
            ErrorTag::BadRequest => StatusCode::BAD_REQUEST,
            ErrorTag::NotFound => StatusCode::NOT_FOUND,
            ErrorTag::Internal | ErrorTag::Api(ErrorKind::Internal) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorTag::Api(ErrorKind::Authentication) => StatusCode::UNAUTHORIZED,
            ErrorTag::Api(ErrorKind::Transport) => StatusCode::SERVICE_UNAVAILABLE,
            ErrorTag::Api(ErrorKind::Upstream4xx | ErrorKind::Upstream5xx | ErrorKind::Decode) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.tag();
        let message = match self {
            AppError::BadRequest { message }
            | AppError::NotFound { message }
            | AppError::Internal { message } => message,
            AppError::Api(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(%status, ?kind, "{message}");
        } else {
            warn!(%status, ?kind, "{message}");
        }

        let body = Json(ErrorResponse {
            kind,
            error: message,
        });
        (status, body).into_response()
    }
}
