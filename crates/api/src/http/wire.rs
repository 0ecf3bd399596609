//! JSON shapes exchanged with the study service and their mapping into domain types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use study_core::model::{
    DifficultyTier, Flashcard, FlashcardId, GeneratedCard, SessionId, SessionStatus, StudySession,
};

use crate::contract::{AuthSession, TierRecommendation};
use crate::error::ApiError;

fn decode<E: core::fmt::Display>(e: E) -> ApiError {
    ApiError::Decode(e.to_string())
}

/// Accepts RFC 3339 as well as offset-less ISO timestamps (read as UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ApiError::Decode(format!("invalid timestamp: {raw}")))
}

// ─── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct StartSessionBody<'a> {
    pub topic: Option<&'a str>,
    pub target_count: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAnswerBody {
    pub flashcard_id: u64,
    pub is_correct: bool,
    pub response_time_seconds: u32,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub text: &'a str,
    pub topic: &'a str,
    pub num_cards: u8,
    pub difficulty: DifficultyTier,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RegisterBody<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

// ─── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct SessionDto {
    pub id: u64,
    #[serde(default)]
    pub topic: Option<String>,
    pub status: String,
    #[serde(default)]
    pub cards_studied: Option<u32>,
    #[serde(default)]
    pub cards_correct: Option<u32>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl SessionDto {
    pub(crate) fn into_session(self) -> Result<StudySession, ApiError> {
        let status: SessionStatus = self.status.parse().map_err(decode)?;
        let created_at = self.created_at.as_deref().map(parse_timestamp).transpose()?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        let mut session = StudySession::from_remote(
            SessionId::new(self.id),
            self.topic,
            status,
            created_at,
            completed_at,
        );
        session.cards_studied = self.cards_studied;
        session.cards_correct = self.cards_correct;
        session.duration_minutes = self.duration_minutes;
        Ok(session)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardDto {
    pub id: u64,
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
}

impl CardDto {
    pub(crate) fn into_flashcard(self) -> Flashcard {
        let difficulty = self
            .difficulty
            .as_deref()
            .map(DifficultyTier::coerce)
            .unwrap_or_default();
        Flashcard {
            id: FlashcardId::new(self.id),
            question: self.question,
            answer: self.answer.unwrap_or_default(),
            difficulty,
            topic: self.topic,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CardBatchDto {
    #[serde(default)]
    pub cards: Vec<CardDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationDto {
    pub recommended_difficulty: Option<String>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub attempts: Option<u32>,
}

impl RecommendationDto {
    pub(crate) fn into_recommendation(self) -> TierRecommendation {
        TierRecommendation {
            recommended: self.recommended_difficulty.unwrap_or_default(),
            accuracy: self.accuracy,
            attempts: self.attempts,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedCardDto {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeneratedBatchDto {
    #[serde(default)]
    pub cards: Vec<GeneratedCardDto>,
}

impl GeneratedBatchDto {
    pub(crate) fn into_cards(self) -> Vec<GeneratedCard> {
        self.cards
            .into_iter()
            .map(|c| GeneratedCard::new(c.question, c.answer))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDto {
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginDto {
    pub access_token: String,
    #[serde(default)]
    pub user: Option<UserDto>,
}

impl LoginDto {
    pub(crate) fn into_auth_session(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            username: self.user.and_then(|u| u.username),
        }
    }
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDto {
    pub detail: serde_json::Value,
}

/// Best-effort human message from an error response body.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorDto>(body) {
        Ok(ErrorDto {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorDto { detail }) => detail.to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let naive = parse_timestamp("2024-03-01T10:15:30.123456").unwrap();
        let rfc = parse_timestamp("2024-03-01T10:15:30.123456Z").unwrap();
        assert_eq!(naive, rfc);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn session_dto_maps_status_and_aggregates() {
        let dto: SessionDto = serde_json::from_str(
            r#"{"id": 4, "user_id": 1, "topic": "History", "status": "active",
                "cards_studied": 0, "cards_correct": 0, "accuracy": 0.0,
                "duration_minutes": 0.0, "created_at": "2024-03-01T10:15:30",
                "completed_at": null}"#,
        )
        .unwrap();
        let session = dto.into_session().unwrap();
        assert_eq!(session.id(), SessionId::new(4));
        assert_eq!(session.topic(), Some("History"));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.cards_studied, Some(0));
    }

    #[test]
    fn card_without_answer_or_known_difficulty_still_decodes() {
        let dto: CardDto =
            serde_json::from_str(r#"{"id": 9, "question": "Q?", "difficulty": "expert"}"#).unwrap();
        let card = dto.into_flashcard();
        assert_eq!(card.answer, "");
        assert_eq!(card.difficulty, DifficultyTier::Medium);
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(error_message(r#"{"detail": "Invalid token"}"#), "Invalid token");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
