//! Web layer for the bus rider backend.
//!
//! JSON endpoints over the Olho Vivo queries, rider stores, cache and
//! maintenance actions.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;
