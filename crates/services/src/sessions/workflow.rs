use std::sync::Arc;

use study_api::{DifficultyApi, Remote, ScoringApi, SessionApi};
use study_core::model::{DifficultyTier, SessionId};

use crate::Clock;
use crate::error::ServiceError;
use super::controller::StudyController;
use super::registry::ActiveSessions;

/// Starts study sessions and hands out their controllers.
///
/// Only one session is live at a time: starting a new one cancels the
/// controllers of any earlier session still registered here.
#[derive(Clone)]
pub struct StudyLoopService {
    clock: Clock,
    sessions: Arc<dyn SessionApi>,
    scoring: Arc<dyn ScoringApi>,
    difficulty: Arc<dyn DifficultyApi>,
    active: Arc<ActiveSessions>,
    initial_tier: DifficultyTier,
}

impl StudyLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionApi>,
        scoring: Arc<dyn ScoringApi>,
        difficulty: Arc<dyn DifficultyApi>,
    ) -> Self {
        Self {
            clock,
            sessions,
            scoring,
            difficulty,
            active: Arc::new(ActiveSessions::new()),
            initial_tier: DifficultyTier::default(),
        }
    }

    #[must_use]
    pub fn from_remote(clock: Clock, remote: &Remote) -> Self {
        Self::new(
            clock,
            Arc::clone(&remote.sessions),
            Arc::clone(&remote.scoring),
            Arc::clone(&remote.difficulty),
        )
    }

    /// Tier used for the first batch of every new session.
    #[must_use]
    pub fn with_initial_tier(mut self, tier: DifficultyTier) -> Self {
        self.initial_tier = tier;
        self
    }

    /// Start a session on the service and return a controller in `Loading`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Api` if the service refuses to start the session.
    pub async fn start_session(
        &self,
        topic: Option<&str>,
        target_count: u32,
    ) -> Result<StudyController, ServiceError> {
        let topic = topic.map(str::trim).filter(|topic| !topic.is_empty());
        let session = self.sessions.start_session(topic, target_count).await?;
        let session_id = session.id();

        let superseded = self.active.cancel_others(session_id);
        if superseded > 0 {
            tracing::info!(%session_id, superseded, "superseded earlier study sessions");
        }
        tracing::info!(%session_id, target_count, topic = topic.unwrap_or(""), "study session started");

        let controller = StudyController::new(
            self.clock,
            session,
            target_count,
            Arc::clone(&self.sessions),
            Arc::clone(&self.scoring),
            Arc::clone(&self.difficulty),
            Arc::clone(&self.active),
        )
        .with_initial_tier(self.initial_tier);
        Ok(controller)
    }

    /// Cancel a running session's in-flight work. Returns false if it was not active.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        self.active.cancel(session_id)
    }

    #[must_use]
    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.active.is_active(session_id)
    }
}
