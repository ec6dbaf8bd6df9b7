//! Bus rider backend for the SPTrans Olho Vivo API.
//!
//! Line search, live bus positions, nearby stops, arrival predictions and
//! line routes, with a persistent TTL cache, favorites and search history,
//! exposed as a JSON web service.

pub mod cache;
pub mod config;
pub mod format;
pub mod location;
pub mod maintenance;
pub mod olhovivo;
pub mod queries;
pub mod storage;
pub mod stores;
pub mod web;
