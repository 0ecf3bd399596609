//! Request/response contracts for the remote study service.
//!
//! The controller only ever talks to the service through these traits, so the
//! HTTP adapter and the in-memory fake are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use study_core::model::{
    AnswerEvent, DifficultyTier, Flashcard, GeneratedCard, SessionId, StudySession,
};

use crate::error::ApiError;

/// Raw estimator output. `recommended` is kept as received; callers decide how
/// to coerce values outside the known tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct TierRecommendation {
    pub recommended: String,
    pub accuracy: Option<f64>,
    pub attempts: Option<u32>,
}

impl TierRecommendation {
    #[must_use]
    pub fn new(recommended: impl Into<String>) -> Self {
        Self {
            recommended: recommended.into(),
            accuracy: None,
            attempts: None,
        }
    }
}

/// Input for text-to-flashcard generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub text: String,
    pub topic: String,
    pub num_cards: u8,
    pub difficulty: DifficultyTier,
}

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub username: Option<String>,
}

/// Session lifecycle and card selection.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Open a new session on the service.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn start_session(
        &self,
        topic: Option<&str>,
        target_count: u32,
    ) -> Result<StudySession, ApiError>;

    /// Fetch the next ordered batch of cards for a session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn fetch_card_batch(
        &self,
        session_id: SessionId,
        tier: Option<DifficultyTier>,
        limit: u32,
    ) -> Result<Vec<Flashcard>, ApiError>;

    /// Mark the session completed.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn complete_session(&self, session_id: SessionId) -> Result<(), ApiError>;
}

/// Answer scoring. Implementations must never repeat a submission on their own.
#[async_trait]
pub trait ScoringApi: Send + Sync {
    /// Report one scored answer.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn submit_answer(&self, event: &AnswerEvent) -> Result<(), ApiError>;
}

/// Adaptive difficulty estimator.
#[async_trait]
pub trait DifficultyApi: Send + Sync {
    /// Ask the estimator which tier to serve next for this session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn recommend_difficulty(
        &self,
        session_id: SessionId,
    ) -> Result<TierRecommendation, ApiError>;
}

/// Text-to-flashcard generation.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Generate question/answer pairs from free text.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport, auth or service failures.
    async fn generate_from_text(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedCard>, ApiError>;
}

/// Account endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for an access token and keep it for later calls.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError>;

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the service rejects the registration.
    async fn register(&self, email: &str, username: &str, password: &str) -> Result<(), ApiError>;

    /// Drop any cached credential.
    fn logout(&self);

    fn is_authenticated(&self) -> bool;
}

/// Aggregates the remote contracts behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Remote {
    pub sessions: Arc<dyn SessionApi>,
    pub scoring: Arc<dyn ScoringApi>,
    pub difficulty: Arc<dyn DifficultyApi>,
    pub generation: Arc<dyn GenerationApi>,
    pub auth: Arc<dyn AuthApi>,
}

impl Remote {
    /// Wire every contract to the same implementation.
    #[must_use]
    pub fn from_single<T>(api: T) -> Self
    where
        T: SessionApi + ScoringApi + DifficultyApi + GenerationApi + AuthApi + 'static,
    {
        let api = Arc::new(api);
        Self {
            sessions: api.clone(),
            scoring: api.clone(),
            difficulty: api.clone(),
            generation: api.clone(),
            auth: api,
        }
    }
}
