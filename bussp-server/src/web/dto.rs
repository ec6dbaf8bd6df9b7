//! Data transfer objects for web requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_relative_time;
use crate::maintenance::ClearReport;
use crate::olhovivo::{
    Arrival, ErrorKind, ProcessedBusLine, ProcessedBusPosition, ProcessedBusStop, StopPrediction,
};
use crate::stores::{FavoriteLine, SearchHistoryItem};

/// Free-text search query.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// Line number, destination or stop name
    #[serde(default)]
    pub q: String,
}

/// Nearby stop search. Both coordinates must be given to override the
/// location provider.
#[derive(Debug, Deserialize)]
pub struct NearbyRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// Optional result limit.
#[derive(Debug, Deserialize)]
pub struct LimitRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LineSearchResponse {
    pub lines: Vec<ProcessedBusLine>,
}

#[derive(Debug, Serialize)]
pub struct StopSearchResponse {
    pub stops: Vec<ProcessedBusStop>,
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub line_code: i64,
    pub positions: Vec<ProcessedBusPosition>,
}

/// Raw predictions plus a flat, soonest-first list of arriving buses.
#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    #[serde(flatten)]
    pub prediction: StopPrediction,
    pub arrivals: Vec<Arrival>,
}

/// Request to add a favorite line.
#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub line_code: i64,
    pub line_name: String,
    pub nickname: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<FavoriteLine>,
}

/// A history item with a human "searched N min ago" label.
#[derive(Debug, Serialize)]
pub struct HistoryItemView {
    #[serde(flatten)]
    pub item: SearchHistoryItem,
    pub searched_label: String,
}

impl HistoryItemView {
    pub fn new(item: SearchHistoryItem, now: DateTime<Utc>) -> Self {
        let searched_label = format_relative_time(item.searched_at, now);
        Self {
            item,
            searched_label,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryItemView>,
}

impl HistoryResponse {
    pub fn new(items: Vec<SearchHistoryItem>) -> Self {
        let now = Utc::now();
        Self {
            history: items
                .into_iter()
                .map(|item| HistoryItemView::new(item, now))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// Outcome of one maintenance step.
#[derive(Debug, Serialize)]
pub struct StepResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<(), String>> for StepResult {
    fn from(result: &Result<(), String>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.as_ref().err().cloned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub complete: bool,
    pub cache: StepResult,
    pub favorites: StepResult,
    pub history: StepResult,
}

impl From<&ClearReport> for ClearResponse {
    fn from(report: &ClearReport) -> Self {
        Self {
            complete: report.is_complete(),
            cache: (&report.cache).into(),
            favorites: (&report.favorites).into(),
            history: (&report.history).into(),
        }
    }
}

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    BadRequest,
    NotFound,
    Internal,
    #[serde(untagged)]
    Api(ErrorKind),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorTag,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tags_serialize_flat() {
        let tags = [
            ErrorTag::BadRequest,
            ErrorTag::NotFound,
            ErrorTag::Api(ErrorKind::Upstream5xx),
            ErrorTag::Api(ErrorKind::Authentication),
        ];
        let json = serde_json::to_value(tags).unwrap();
        assert_eq!(
            json,
            serde_json::json!(["bad_request", "not_found", "upstream_5xx", "authentication"])
        );
    }

    #[test]
    fn clear_response_reports_each_step() {
        let report = ClearReport {
            cache: Ok(()),
            favorites: Err("disk full".into()),
            history: Ok(()),
        };
        let json = serde_json::to_value(ClearResponse::from(&report)).unwrap();
        assert_eq!(json["complete"], false);
        assert_eq!(json["cache"], serde_json::json!({ "ok": true }));
        assert_eq!(json["favorites"]["error"], "disk full");
    }
}
