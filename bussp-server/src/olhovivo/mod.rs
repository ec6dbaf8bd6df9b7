//! SPTrans "Olho Vivo" API client.
//!
//! This module provides an HTTP client for the São Paulo bus API, which
//! serves line search, live vehicle positions, stops and arrival
//! predictions.
//!
//! Key characteristics of Olho Vivo:
//! - Every data call requires a prior `POST /Login/Autenticar`, which sets
//!   a session cookie. The client logs in lazily and again after a 401.
//! - Responses use terse single-letter keys (`cl`, `tp`, `py`, ...); the
//!   [`convert`] functions map them onto display records.
//! - Login answers `200 true` or `200 false`, so the status alone does not
//!   prove the token was accepted.

mod client;
pub mod convert;
mod error;
mod session;
mod types;

pub use client::{OlhoVivoClient, OlhoVivoConfig};
pub use convert::{Arrival, ProcessedBusLine, ProcessedBusPosition, ProcessedBusStop};
pub use error::{ErrorKind, OlhoVivoError};
pub use session::Session;
pub use types::{
    ArrivingVehicle, BusLine, BusPosition, BusStop, LinePositions, LinePrediction,
    PredictionStop, StopPrediction,
};
