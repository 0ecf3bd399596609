use serde::{Deserialize, Serialize};

use crate::model::ids::{FlashcardId, SessionId};

/// One scored answer, reported to the remote scoring endpoint exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub session_id: SessionId,
    pub flashcard_id: FlashcardId,
    pub is_correct: bool,
    pub response_time_seconds: u32,
}

impl AnswerEvent {
    #[must_use]
    pub fn new(
        session_id: SessionId,
        flashcard_id: FlashcardId,
        is_correct: bool,
        response_time_seconds: u32,
    ) -> Self {
        Self {
            session_id,
            flashcard_id,
            is_correct,
            response_time_seconds,
        }
    }

    /// Key used to de-duplicate explicit resubmissions.
    #[must_use]
    pub fn dedup_key(&self) -> (SessionId, FlashcardId) {
        (self.session_id, self.flashcard_id)
    }
}
