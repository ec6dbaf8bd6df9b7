//! Per-operation fetch policies.

use std::time::Duration;

/// How long a result stays fresh, how often a failed fetch is retried, and
/// how often live data is refetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    pub stale_time: Duration,
    pub retries: u32,
    pub refetch_interval: Option<Duration>,
    /// Upper bound on cached results for the operation.
    pub max_capacity: u64,
}

impl QueryPolicy {
    pub const SEARCH_LINES: QueryPolicy = QueryPolicy {
        stale_time: Duration::from_secs(5 * 60),
        retries: 2,
        refetch_interval: None,
        max_capacity: 500,
    };

    pub const POSITIONS: QueryPolicy = QueryPolicy {
        stale_time: Duration::from_secs(30),
        retries: 3,
        refetch_interval: Some(Duration::from_secs(30)),
        max_capacity: 200,
    };

    pub const NEARBY_STOPS: QueryPolicy = QueryPolicy {
        stale_time: Duration::from_secs(10 * 60),
        retries: 2,
        refetch_interval: None,
        max_capacity: 200,
    };

    pub const STOP_PREDICTIONS: QueryPolicy = QueryPolicy {
        stale_time: Duration::from_secs(60),
        retries: 2,
        refetch_interval: Some(Duration::from_secs(60)),
        max_capacity: 500,
    };

    pub const LINE_ROUTE: QueryPolicy = QueryPolicy {
        stale_time: Duration::from_secs(24 * 60 * 60),
        retries: 2,
        refetch_interval: None,
        max_capacity: 500,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polled_operations_refetch_at_their_stale_time() {
        for policy in [QueryPolicy::POSITIONS, QueryPolicy::STOP_PREDICTIONS] {
            assert_eq!(policy.refetch_interval, Some(policy.stale_time));
        }
        assert_eq!(QueryPolicy::LINE_ROUTE.refetch_interval, None);
    }
}
