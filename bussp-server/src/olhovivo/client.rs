//! Olho Vivo HTTP client.
//!
//! Provides async methods for querying the SPTrans Olho Vivo API.
//! Handles the login handshake, bounds concurrent requests, and maps
//! failures onto [`OlhoVivoError`].

use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

use super::error::OlhoVivoError;
use super::session::Session;
use super::types::{BusLine, BusStop, LinePositions, StopPrediction};

/// Default base URL for the Olho Vivo API.
const DEFAULT_BASE_URL: &str = "http://api.olhovivo.sptrans.com.br/v2.1";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

const LOGIN: &str = "/Login/Autenticar";
const SEARCH_LINES: &str = "/Linha/Buscar";
const LINE_DETAILS: &str = "/Linha/CarregarDetalhes";
const LINE_POSITIONS: &str = "/Posicao/Linha";
const SEARCH_STOPS: &str = "/Parada/Buscar";
const NEARBY_STOPS: &str = "/Parada/BuscarParadasProximas";
const STOP_PREDICTIONS: &str = "/Previsao/Parada";
const LINE_PREDICTIONS: &str = "/Previsao/Linha";

/// Configuration for the Olho Vivo client.
#[derive(Debug, Clone)]
pub struct OlhoVivoConfig {
    /// API token sent to the login endpoint
    pub api_token: String,
    /// Base URL for the API (defaults to production v2.1)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OlhoVivoConfig {
    /// Create a new config with the given API token.
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 10,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Olho Vivo API client.
///
/// Owns the login [`Session`]. Every data call logs in first if needed; a
/// 401 on a data call drops the session so the next call logs in again.
/// Logins are serialized, so concurrent callers never race to log in twice.
#[derive(Debug)]
pub struct OlhoVivoClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
    session: Mutex<Session>,
    semaphore: Arc<Semaphore>,
}

impl OlhoVivoClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OlhoVivoConfig) -> Result<Self, OlhoVivoError> {
        if config.api_token.trim().is_empty() {
            return Err(OlhoVivoError::NotConfigured(
                "SPTrans API token is empty".to_string(),
            ));
        }

        // The login call sets the session cookie that data calls rely on.
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            api_token: config.api_token,
            session: Mutex::new(Session::default()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Log in with the configured token.
    ///
    /// Returns whether the token was accepted. Any failure (network error,
    /// non-success status, a `false` body) leaves the session
    /// unauthenticated.
    pub async fn authenticate(&self) -> bool {
        let mut session = self.session.lock().await;
        self.login(&mut session).await
    }

    /// Log in unless the session is already authenticated.
    pub async fn ensure_authenticated(&self) -> Result<(), OlhoVivoError> {
        let mut session = self.session.lock().await;
        if session.is_authenticated() {
            return Ok(());
        }

        if self.login(&mut session).await {
            Ok(())
        } else {
            Err(OlhoVivoError::Authentication)
        }
    }

    /// Whether the last login was accepted and not rejected since.
    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.is_authenticated()
    }

    /// Drop the session; the next data call logs in again.
    pub async fn invalidate(&self) {
        self.session.lock().await.invalidate();
    }

    /// Search lines by number or destination name.
    pub async fn search_lines(&self, query: &str) -> Result<Vec<BusLine>, OlhoVivoError> {
        self.get_json(SEARCH_LINES, &[("termosBusca", query.to_string())])
            .await
    }

    /// Live vehicle positions for a line.
    pub async fn positions(&self, line_code: i64) -> Result<LinePositions, OlhoVivoError> {
        self.get_json(LINE_POSITIONS, &[("codigoLinha", line_code.to_string())])
            .await
    }

    /// Search stops by name or address.
    pub async fn search_stops(&self, query: &str) -> Result<Vec<BusStop>, OlhoVivoError> {
        self.get_json(SEARCH_STOPS, &[("termosBusca", query.to_string())])
            .await
    }

    /// Stops close to a coordinate.
    pub async fn nearby_stops(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<BusStop>, OlhoVivoError> {
        self.get_json(
            NEARBY_STOPS,
            &[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
            ],
        )
        .await
    }

    /// Arrival predictions for every line at a stop.
    pub async fn stop_predictions(&self, stop_code: i64) -> Result<StopPrediction, OlhoVivoError> {
        self.get_json(STOP_PREDICTIONS, &[("codigoParada", stop_code.to_string())])
            .await
    }

    /// Arrival predictions for one line at a stop.
    pub async fn line_predictions(
        &self,
        line_code: i64,
        stop_code: i64,
    ) -> Result<StopPrediction, OlhoVivoError> {
        self.get_json(
            LINE_PREDICTIONS,
            &[
                ("codigoLinha", line_code.to_string()),
                ("codigoParada", stop_code.to_string()),
            ],
        )
        .await
    }

    /// Route details for a line, passed through unvalidated.
    pub async fn line_route(&self, line_code: i64) -> Result<serde_json::Value, OlhoVivoError> {
        self.get_json(LINE_DETAILS, &[("codigoLinha", line_code.to_string())])
            .await
    }

    /// Perform the login request, updating `session` in place.
    async fn login(&self, session: &mut Session) -> bool {
        let url = format!("{}{}", self.base_url, LOGIN);

        let response = match self
            .http
            .post(&url)
            .query(&[("token", self.api_token.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "SPTrans authentication failed");
                session.invalidate();
                return false;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "SPTrans authentication rejected");
            session.invalidate();
            return false;
        }

        // Olho Vivo answers 200 with a JSON boolean.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "SPTrans authentication response unreadable");
                session.invalidate();
                return false;
            }
        };
        if body.trim() == "false" {
            warn!("SPTrans authentication rejected the API token");
            session.invalidate();
            return false;
        }

        info!("authenticated with SPTrans API");
        *session = Session::authenticated(Utc::now());
        true
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, OlhoVivoError> {
        self.ensure_authenticated().await?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| OlhoVivoError::NotConfigured("request semaphore closed".to_string()))?;

        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, "requesting");

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(endpoint, "session rejected, dropping it");
            self.invalidate().await;
            return Err(OlhoVivoError::Unauthorized {
                endpoint: endpoint.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OlhoVivoError::Upstream {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| OlhoVivoError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })
    }
}
