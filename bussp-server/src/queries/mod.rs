//! Data-fetching orchestration over the Olho Vivo client.
//!
//! Each operation has a staleness window (an in-memory moka cache per
//! operation), a retry budget, and an enable condition that short-circuits
//! to an empty result without touching the network. Live data is polled
//! with [`Poll`]; superseded requests are cancelled with [`LatestQuery`].

mod bus;
mod latest;
mod policy;
mod poll;

pub use bus::{BusQueries, QueryError, QueryResult};
pub use latest::LatestQuery;
pub use policy::QueryPolicy;
pub use poll::{Poll, QueryState, poll};
