//! Olho Vivo client error types.

use serde::Serialize;

/// Errors from the Olho Vivo HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum OlhoVivoError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The login call did not accept the API token.
    #[error("failed to authenticate with SPTrans API")]
    Authentication,

    /// A data call was rejected with 401; the session has been dropped.
    #[error("session rejected by {endpoint} (401)")]
    Unauthorized { endpoint: String },

    /// API returned a non-success status code
    #[error("API request to {endpoint} failed: {status} {message}")]
    Upstream {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// JSON deserialization failed
    #[error("JSON parse error from {endpoint}: {message}")]
    Decode {
        endpoint: String,
        message: String,
        body: Option<String>,
    },

    /// Client could not be built from its configuration
    #[error("not configured: {0}")]
    NotConfigured(String),
}

/// Coarse error classification handed to callers instead of message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Transport,
    #[serde(rename = "upstream_4xx")]
    Upstream4xx,
    #[serde(rename = "upstream_5xx")]
    Upstream5xx,
    Decode,
    Internal,
}

impl OlhoVivoError {
    /// Classify the error.
    ///
    /// A 401 on a data call is an authentication problem, not a generic 4xx.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OlhoVivoError::Transport(_) => ErrorKind::Transport,
            OlhoVivoError::Authentication | OlhoVivoError::Unauthorized { .. } => {
                ErrorKind::Authentication
            }
            OlhoVivoError::Upstream { status, .. } if *status >= 500 => ErrorKind::Upstream5xx,
            OlhoVivoError::Upstream { .. } => ErrorKind::Upstream4xx,
            OlhoVivoError::Decode { .. } => ErrorKind::Decode,
            OlhoVivoError::NotConfigured(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    ///
    /// A rejected session is retryable because the next attempt logs in
    /// again; a rejected token is not.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::Transport | ErrorKind::Upstream5xx => true,
            ErrorKind::Authentication => matches!(self, OlhoVivoError::Unauthorized { .. }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = OlhoVivoError::Authentication;
        assert_eq!(err.to_string(), "failed to authenticate with SPTrans API");

        let err = OlhoVivoError::Upstream {
            endpoint: "/Linha/Buscar".into(),
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(
            err.to_string(),
            "API request to /Linha/Buscar failed: 500 Internal Server Error"
        );

        let err = OlhoVivoError::Decode {
            endpoint: "/Posicao/Linha".into(),
            message: "expected a sequence".into(),
            body: Some("{}".into()),
        };
        assert!(err.to_string().contains("JSON parse error"));
        assert!(err.to_string().contains("expected a sequence"));
    }

    #[test]
    fn kind_splits_upstream_by_status() {
        let client_side = OlhoVivoError::Upstream {
            endpoint: "/Linha/Buscar".into(),
            status: 404,
            message: String::new(),
        };
        let server_side = OlhoVivoError::Upstream {
            endpoint: "/Linha/Buscar".into(),
            status: 503,
            message: String::new(),
        };

        assert_eq!(client_side.kind(), ErrorKind::Upstream4xx);
        assert_eq!(server_side.kind(), ErrorKind::Upstream5xx);
        assert!(!client_side.is_retryable());
        assert!(server_side.is_retryable());
    }

    #[test]
    fn unauthorized_is_authentication_but_retryable() {
        let err = OlhoVivoError::Unauthorized {
            endpoint: "/Posicao/Linha".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.is_retryable());
        assert!(!OlhoVivoError::Authentication.is_retryable());
    }

    #[test]
    fn kind_serializes_as_tag() {
        let json = serde_json::to_string(&ErrorKind::Upstream4xx).unwrap();
        assert_eq!(json, "\"upstream_4xx\"");
        let json = serde_json::to_string(&ErrorKind::Authentication).unwrap();
        assert_eq!(json, "\"authentication\"");
    }
}
