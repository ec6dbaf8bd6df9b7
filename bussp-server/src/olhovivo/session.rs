//! Upstream login session state.

use chrono::{DateTime, Utc};

/// Login state of one [`OlhoVivoClient`](super::OlhoVivoClient).
///
/// The upstream session itself lives in the client's cookie jar; this only
/// records whether the last login was accepted and has not been rejected
/// since.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated {
        /// When the login call succeeded.
        since: DateTime<Utc>,
    },
}

impl Session {
    /// Session after a successful login at `now`.
    pub fn authenticated(now: DateTime<Utc>) -> Self {
        Session::Authenticated { since: now }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    /// Drop the session. The next data call logs in again.
    pub fn invalidate(&mut self) {
        *self = Session::Unauthenticated;
    }
}
