//! Shared error types for the services crate.

use study_api::ApiError;
use study_core::model::SessionId;
use thiserror::Error;

use crate::sessions::StudyPhase;

/// Coarse classification used by callers to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential missing or expired; the caller should route to login.
    Auth,
    /// Network or service hiccup; the same action may be retried by hand.
    TransientNetwork,
    /// Malformed input, rejected before or by the service.
    Validation,
    /// Action not allowed in the current controller state.
    State,
}

impl ErrorKind {
    #[must_use]
    pub fn of_api(err: &ApiError) -> Self {
        if err.is_auth() {
            ErrorKind::Auth
        } else if err.is_validation() {
            ErrorKind::Validation
        } else {
            ErrorKind::TransientNetwork
        }
    }
}

/// Input rejected before any network call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("text to generate from cannot be empty")]
    EmptyText,
    #[error("topic cannot be empty")]
    EmptyTopic,
    #[error("number of cards must be between {min} and {max}, got {got}")]
    CardCountOutOfRange { got: u32, min: u8, max: u8 },
    #[error("email cannot be empty")]
    EmptyEmail,
    #[error("username cannot be empty")]
    EmptyUsername,
    #[error("password cannot be empty")]
    EmptyPassword,
}

/// Action invalid for the current state of a study session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StateError {
    #[error("another request for this session is still in flight")]
    Busy,
    #[error("the answer must be revealed before scoring")]
    NotRevealed,
    #[error("cannot {action} while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: StudyPhase,
    },
    #[error("session already completed")]
    SessionCompleted,
    #[error("session {0} was superseded")]
    Superseded(SessionId),
}

/// Errors emitted by services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Api(err) => ErrorKind::of_api(err),
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::State(_) => ErrorKind::State,
        }
    }

    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_onto_the_taxonomy() {
        assert_eq!(
            ServiceError::from(ApiError::Unauthorized).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            ServiceError::from(ApiError::Unavailable("down".into())).kind(),
            ErrorKind::TransientNetwork
        );
        assert_eq!(
            ServiceError::from(ApiError::from_status(422, "bad")).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ServiceError::from(StateError::Busy).kind(),
            ErrorKind::State
        );
    }
}
