use std::sync::Arc;

use study_api::{GenerationApi, GenerationRequest};
use study_core::model::{DifficultyTier, GeneratedCard};

use crate::error::{ServiceError, ValidationError};

pub const MIN_GENERATED_CARDS: u8 = 1;
pub const MAX_GENERATED_CARDS: u8 = 20;

/// Turns free text into flashcards through the remote generator.
#[derive(Clone)]
pub struct GenerationService {
    generation: Arc<dyn GenerationApi>,
}

impl GenerationService {
    #[must_use]
    pub fn new(generation: Arc<dyn GenerationApi>) -> Self {
        Self { generation }
    }

    /// Generate up to `num_cards` question/answer pairs about `topic` from `text`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for blank text or topic or a card
    /// count outside `1..=20`, before any request is made. Remote failures are
    /// returned as `ServiceError::Api`.
    pub async fn generate(
        &self,
        text: &str,
        topic: &str,
        num_cards: u32,
        difficulty: DifficultyTier,
    ) -> Result<Vec<GeneratedCard>, ServiceError> {
        let request = validate(text, topic, num_cards, difficulty)?;
        tracing::info!(
            topic = %request.topic,
            num_cards = request.num_cards,
            %difficulty,
            text_len = request.text.len(),
            "generating flashcards"
        );
        let cards = self.generation.generate_from_text(&request).await?;
        tracing::debug!(generated = cards.len(), "generation finished");
        Ok(cards)
    }
}

fn validate(
    text: &str,
    topic: &str,
    num_cards: u32,
    difficulty: DifficultyTier,
) -> Result<GenerationRequest, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ValidationError::EmptyTopic);
    }
    let num_cards = u8::try_from(num_cards)
        .ok()
        .filter(|n| (MIN_GENERATED_CARDS..=MAX_GENERATED_CARDS).contains(n))
        .ok_or(ValidationError::CardCountOutOfRange {
            got: num_cards,
            min: MIN_GENERATED_CARDS,
            max: MAX_GENERATED_CARDS,
        })?;

    Ok(GenerationRequest {
        text: text.to_owned(),
        topic: topic.to_owned(),
        num_cards,
        difficulty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_input() {
        assert_eq!(
            validate("   ", "Bio", 5, DifficultyTier::Easy),
            Err(ValidationError::EmptyText)
        );
        assert_eq!(
            validate("cells divide", "\t", 5, DifficultyTier::Easy),
            Err(ValidationError::EmptyTopic)
        );
    }

    #[test]
    fn card_count_bounds_are_inclusive() {
        assert!(validate("t", "x", 1, DifficultyTier::Medium).is_ok());
        assert!(validate("t", "x", 20, DifficultyTier::Medium).is_ok());
        for bad in [0, 21, 300] {
            assert_eq!(
                validate("t", "x", bad, DifficultyTier::Medium),
                Err(ValidationError::CardCountOutOfRange {
                    got: bad,
                    min: 1,
                    max: 20
                })
            );
        }
    }

    #[test]
    fn trims_text_and_topic() {
        let request = validate("  photosynthesis  ", " Biology ", 3, DifficultyTier::Hard).unwrap();
        assert_eq!(request.text, "photosynthesis");
        assert_eq!(request.topic, "Biology");
        assert_eq!(request.num_cards, 3);
    }
}
