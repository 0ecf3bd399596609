use serde::Serialize;
use study_api::ApiError;
use study_core::model::{AnswerEvent, DifficultyTier, FlashcardId, SessionId, SessionStats};

use super::progress::SessionProgress;

/// Controller state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyPhase {
    Loading,
    Presenting,
    Revealed,
    Scoring,
    Completing,
    Completed,
}

/// What the learner currently sees. `answer` is only populated once revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub flashcard_id: FlashcardId,
    /// 1-based position within the loaded batch.
    pub position: usize,
    pub total: usize,
    pub question: String,
    pub answer: Option<String>,
    pub difficulty: DifficultyTier,
}

/// Point-in-time copy of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub session_id: SessionId,
    pub phase: StudyPhase,
    pub in_flight: bool,
    pub stats: SessionStats,
    pub accuracy: f64,
    pub tier: DifficultyTier,
    pub progress: SessionProgress,
    pub pending_answers: usize,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// Every loaded card was answered.
    Exhausted,
    /// The learner ended the session before the last card.
    EndedEarly,
    /// The batch came back empty (or nothing was requested).
    EmptyCardSet,
}

/// Final numbers for a finished session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub reason: CompletionReason,
    pub empty_card_set: bool,
    pub stats: SessionStats,
    pub accuracy: f64,
    pub cards_total: usize,
    pub final_tier: DifficultyTier,
}

/// Returned when a session reaches `Completed`. The caller should navigate away
/// regardless of `completion_error`.
#[derive(Debug)]
pub struct SessionCompletion {
    pub outcome: SessionOutcome,
    /// Set when the remote "complete session" call failed.
    pub completion_error: Option<ApiError>,
}

impl SessionCompletion {
    #[must_use]
    pub fn empty_card_set(&self) -> bool {
        self.outcome.empty_card_set
    }
}

/// Result of loading the session's card batch.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Cards are loaded and the first one is presented.
    Ready(CardView),
    /// Nothing to study; the session was completed immediately.
    Empty(SessionCompletion),
    /// The session was ended or superseded while the fetch was in flight.
    Discarded,
}

/// Where the controller went after scoring a card.
#[derive(Debug)]
pub enum NextStep {
    Present(CardView),
    Completed(SessionCompletion),
    /// The session was ended or superseded while scoring was in flight.
    Discarded,
}

/// Everything that happened while scoring one card.
///
/// Remote failures are reported here rather than as errors: the local tally
/// and the card progression stand either way.
#[derive(Debug)]
pub struct AnswerReport {
    pub event: AnswerEvent,
    pub stats: SessionStats,
    pub accuracy: f64,
    /// Tier that will be used for the next batch fetch.
    pub tier: DifficultyTier,
    /// True when the estimator answered with a value outside the known tiers.
    pub tier_coerced: bool,
    pub submit_error: Option<ApiError>,
    pub difficulty_error: Option<ApiError>,
    pub next: NextStep,
}

impl AnswerReport {
    /// Whether any remote call failed because the credential was rejected.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        [&self.submit_error, &self.difficulty_error]
            .into_iter()
            .flatten()
            .any(ApiError::is_auth)
    }
}

/// Result of an explicit resubmission of failed answers.
#[derive(Debug, Default)]
pub struct ResubmitReport {
    pub delivered: Vec<FlashcardId>,
    pub still_pending: usize,
    pub last_error: Option<ApiError>,
}
