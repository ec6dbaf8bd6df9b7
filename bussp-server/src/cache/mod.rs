//! Local TTL cache.
//!
//! Namespaced, expiring entries on top of a [`KeyValueStore`]. Entries expire
//! lazily on read and eagerly through [`TtlCache::cleanup`]. Writes keep the
//! namespace within a size bound by sweeping expired entries and then
//! evicting the least recently used.
//!
//! [`KeyValueStore`]: crate::storage::KeyValueStore

mod clock;
mod error;
mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use ttl::{CacheConfig, CacheEntry, CacheStats, TtlCache};
