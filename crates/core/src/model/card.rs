use serde::{Deserialize, Serialize};

use crate::model::ids::FlashcardId;
use crate::model::tier::DifficultyTier;

//
// ─── FLASHCARD ─────────────────────────────────────────────────────────────────
//

/// A flashcard as served to a study session.
///
/// Owned by the remote flashcard store; read-only for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: FlashcardId,
    pub question: String,
    pub answer: String,
    pub difficulty: DifficultyTier,
    pub topic: Option<String>,
}

impl Flashcard {
    #[must_use]
    pub fn new(
        id: FlashcardId,
        question: impl Into<String>,
        answer: impl Into<String>,
        difficulty: DifficultyTier,
    ) -> Self {
        Self {
            id,
            question: question.into(),
            answer: answer.into(),
            difficulty,
            topic: None,
        }
    }

    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

//
// ─── GENERATED CARD ────────────────────────────────────────────────────────────
//

/// Question/answer pair produced by the text-to-flashcard generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub question: String,
    pub answer: String,
}

impl GeneratedCard {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}
