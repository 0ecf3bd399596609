//! `reqwest` adapter for the remote study service.

mod wire;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use study_core::model::{
    AnswerEvent, DifficultyTier, Flashcard, GeneratedCard, SessionId, StudySession,
};

use crate::config::ClientConfig;
use crate::contract::{
    AuthApi, AuthSession, DifficultyApi, GenerationApi, GenerationRequest, ScoringApi,
    SessionApi, TierRecommendation,
};
use crate::error::ApiError;
use wire::{
    CardBatchDto, GenerateBody, GeneratedBatchDto, LoginBody, LoginDto, RecommendationDto,
    RegisterBody, SessionDto, StartSessionBody, SubmitAnswerBody, error_message,
};

/// Shared slot for the bearer token. Cleared whenever the service answers 401.
#[derive(Clone, Default)]
pub struct Credentials {
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(token)),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        self.token().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Safe to repeat on transient failures.
    Idempotent,
    /// Sent at most once.
    Never,
}

/// HTTP client for the study service.
#[derive(Clone)]
pub struct HttpStudyApi {
    client: Client,
    config: ClientConfig,
    credentials: Credentials,
}

impl HttpStudyApi {
    /// Build a client from config. A token in the config seeds the credential slot.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let credentials = Credentials::new(config.access_token.clone());
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn execute<T, F>(&self, op: &'static str, retry: Retry, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let policy = &self.config.retry;
        let mut attempt = 0_u32;
        loop {
            match self.send_once(op, &build).await {
                Ok(value) => return Ok(value),
                Err(err)
                    if retry == Retry::Idempotent
                        && err.is_transient()
                        && !matches!(err, ApiError::Decode(_))
                        && attempt < policy.max_retries =>
                {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(op, attempt, ?delay, error = %err, "retrying request");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<T, F>(&self, op: &'static str, build: &F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = build(&self.client);
        if let Some(token) = self.credentials.token() {
            request = request
                .bearer_auth(&token)
                .query(&[("token", token.as_str())]);
        }

        tracing::debug!(op, "sending request");
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!(op, "credential rejected, clearing cached token");
            self.credentials.clear();
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16(), error_message(&body)));
        }

        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|e| ApiError::Decode(format!("{op}: {e}")))
    }
}

#[async_trait]
impl SessionApi for HttpStudyApi {
    async fn start_session(
        &self,
        topic: Option<&str>,
        target_count: u32,
    ) -> Result<StudySession, ApiError> {
        let url = self.config.endpoint("study/session/start");
        let body = StartSessionBody {
            topic,
            target_count,
        };
        let dto: SessionDto = self
            .execute("start_session", Retry::Idempotent, |client| {
                client.post(&url).json(&body)
            })
            .await?;
        dto.into_session()
    }

    async fn fetch_card_batch(
        &self,
        session_id: SessionId,
        tier: Option<DifficultyTier>,
        limit: u32,
    ) -> Result<Vec<Flashcard>, ApiError> {
        let url = self
            .config
            .endpoint(&format!("study/cards-for-session/{session_id}"));
        let limit = limit.to_string();
        let dto: CardBatchDto = self
            .execute("fetch_card_batch", Retry::Idempotent, |client| {
                let mut request = client.get(&url).query(&[("limit", limit.as_str())]);
                if let Some(tier) = tier {
                    request = request.query(&[("difficulty", tier.as_str())]);
                }
                request
            })
            .await?;
        Ok(dto.cards.into_iter().map(wire::CardDto::into_flashcard).collect())
    }

    async fn complete_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        let url = self
            .config
            .endpoint(&format!("study/session/{session_id}/complete"));
        let _: IgnoredAny = self
            .execute("complete_session", Retry::Idempotent, |client| {
                client.post(&url)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScoringApi for HttpStudyApi {
    async fn submit_answer(&self, event: &AnswerEvent) -> Result<(), ApiError> {
        let url = self.config.endpoint("study/quiz/answer");
        let session_id = event.session_id.to_string();
        let body = SubmitAnswerBody {
            flashcard_id: event.flashcard_id.value(),
            is_correct: event.is_correct,
            response_time_seconds: event.response_time_seconds,
        };
        // A repeated submission would be scored twice by the service.
        let _: IgnoredAny = self
            .execute("submit_answer", Retry::Never, |client| {
                client
                    .post(&url)
                    .query(&[("session_id", session_id.as_str())])
                    .json(&body)
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DifficultyApi for HttpStudyApi {
    async fn recommend_difficulty(
        &self,
        session_id: SessionId,
    ) -> Result<TierRecommendation, ApiError> {
        let url = self
            .config
            .endpoint(&format!("study/adaptive-difficulty/{session_id}"));
        let dto: RecommendationDto = self
            .execute("recommend_difficulty", Retry::Idempotent, |client| {
                client.get(&url)
            })
            .await?;
        Ok(dto.into_recommendation())
    }
}

#[async_trait]
impl GenerationApi for HttpStudyApi {
    async fn generate_from_text(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedCard>, ApiError> {
        let url = self.config.endpoint("flashcards/generate-from-text");
        let body = GenerateBody {
            text: &request.text,
            topic: &request.topic,
            num_cards: request.num_cards,
            difficulty: request.difficulty,
        };
        let dto: GeneratedBatchDto = self
            .execute("generate_from_text", Retry::Idempotent, |client| {
                client.post(&url).json(&body)
            })
            .await?;
        Ok(dto.into_cards())
    }
}

#[async_trait]
impl AuthApi for HttpStudyApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let url = self.config.endpoint("auth/login");
        let body = LoginBody { email, password };
        let dto: LoginDto = self
            .execute("login", Retry::Idempotent, |client| {
                client.post(&url).json(&body)
            })
            .await?;
        let session = dto.into_auth_session();
        self.credentials.set(session.access_token.clone());
        tracing::info!(username = ?session.username, "logged in");
        Ok(session)
    }

    async fn register(&self, email: &str, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.config.endpoint("auth/register");
        let body = RegisterBody {
            email,
            username,
            password,
        };
        let _: IgnoredAny = self
            .execute("register", Retry::Never, |client| {
                client.post(&url).json(&body)
            })
            .await?;
        Ok(())
    }

    fn logout(&self) {
        self.credentials.clear();
    }

    fn is_authenticated(&self) -> bool {
        self.credentials.is_present()
    }
}
