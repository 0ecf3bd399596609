//! Errors surfaced by remote collaborators.

use thiserror::Error;

/// Errors surfaced by the remote study service adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Missing, expired or rejected credential. The cached token has been cleared.
    #[error("not authenticated")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Build a status error from an HTTP status code and a response body.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 401 {
            return Self::Unauthorized;
        }
        Self::Status {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Unavailable(_) | ApiError::Decode(_) => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            ApiError::Unauthorized | ApiError::Rejected(_) => false,
        }
    }

    /// Whether the service refused the input itself (4xx other than auth).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        match self {
            ApiError::Rejected(_) => true,
            ApiError::Status { .. } => !self.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_maps_to_auth() {
        let err = ApiError::from_status(401, "Invalid token");
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient_and_client_errors_are_not() {
        assert!(ApiError::from_status(503, "down").is_transient());
        assert!(ApiError::from_status(429, "slow down").is_transient());

        let not_found = ApiError::from_status(404, "Session not found");
        assert!(!not_found.is_transient());
        assert!(not_found.is_validation());
    }
}
