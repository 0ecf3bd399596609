use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::SessionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudySessionError {
    #[error("unknown session status: {0:?}")]
    UnknownStatus(String),

    #[error("session {0} is already completed")]
    AlreadyCompleted(SessionId),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a study session as tracked by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    /// Reported by the service for suspended sessions; the client treats it as
    /// not completed.
    Paused,
    Completed,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = StudySessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            other => Err(StudySessionError::UnknownStatus(other.to_string())),
        }
    }
}

//
// ─── STUDY SESSION ─────────────────────────────────────────────────────────────
//

/// Client-side cached copy of a study session.
///
/// `id` and `topic` never change after creation. `status` only moves to
/// `Completed` through [`StudySession::complete`]. The remaining fields are
/// informational aggregates reported by the service and may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StudySession {
    id: SessionId,
    topic: Option<String>,
    status: SessionStatus,
    pub cards_studied: Option<u32>,
    pub cards_correct: Option<u32>,
    pub duration_minutes: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl StudySession {
    /// A freshly started, active session.
    #[must_use]
    pub fn new(id: SessionId, topic: Option<String>) -> Self {
        Self {
            id,
            topic: topic.filter(|t| !t.trim().is_empty()),
            status: SessionStatus::Active,
            cards_studied: None,
            cards_correct: None,
            duration_minutes: None,
            created_at: None,
            completed_at: None,
        }
    }

    /// Rehydrate a session from what the service reported.
    #[must_use]
    pub fn from_remote(
        id: SessionId,
        topic: Option<String>,
        status: SessionStatus,
        created_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut session = Self::new(id, topic);
        session.status = status;
        session.created_at = created_at;
        session.completed_at = completed_at;
        session
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// Mark the session completed.
    ///
    /// # Errors
    ///
    /// Returns `StudySessionError::AlreadyCompleted` if the session was already closed.
    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), StudySessionError> {
        if self.is_completed() {
            return Err(StudySessionError::AlreadyCompleted(self.id));
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn new_session_is_active_and_drops_blank_topic() {
        let session = StudySession::new(SessionId::new(1), Some("  ".into()));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.topic(), None);
    }

    #[test]
    fn complete_moves_status_once() {
        let mut session = StudySession::new(SessionId::new(3), Some("Biology".into()));
        session.complete(fixed_now()).unwrap();
        assert!(session.is_completed());
        assert_eq!(session.completed_at(), Some(fixed_now()));
        assert_eq!(session.topic(), Some("Biology"));

        let err = session.complete(fixed_now()).unwrap_err();
        assert_eq!(err, StudySessionError::AlreadyCompleted(SessionId::new(3)));
    }

    #[test]
    fn status_parse_rejects_unknown_values() {
        assert_eq!("paused".parse::<SessionStatus>(), Ok(SessionStatus::Paused));
        assert!(matches!(
            "archived".parse::<SessionStatus>(),
            Err(StudySessionError::UnknownStatus(_))
        ));
        assert!(!SessionStatus::Paused.is_completed());
    }
}
