use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use study_core::model::{
    AnswerEvent, DifficultyTier, Flashcard, GeneratedCard, SessionId, StudySession,
};
use study_core::time::Clock;
use tokio::sync::Notify;

use crate::contract::{
    AuthApi, AuthSession, DifficultyApi, GenerationApi, GenerationRequest, ScoringApi,
    SessionApi, TierRecommendation,
};
use crate::error::ApiError;

/// One call received by the fake, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    StartSession {
        topic: Option<String>,
        target_count: u32,
    },
    FetchCardBatch {
        session_id: SessionId,
        tier: Option<DifficultyTier>,
        limit: u32,
    },
    SubmitAnswer(AnswerEvent),
    RecommendDifficulty(SessionId),
    CompleteSession(SessionId),
    GenerateFromText(GenerationRequest),
    Login(String),
}

/// Operations that can be made to fail or to wait on a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartSession,
    FetchCardBatch,
    SubmitAnswer,
    RecommendDifficulty,
    CompleteSession,
    GenerateFromText,
    Login,
}

/// Failure injected into the next call of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    Unauthorized,
    Status(u16),
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Failure::Unavailable => ApiError::Unavailable("injected failure".into()),
            Failure::Unauthorized => ApiError::Unauthorized,
            Failure::Status(status) => ApiError::from_status(status, "injected failure"),
        }
    }
}

#[derive(Default)]
struct State {
    next_session_id: u64,
    sessions: HashMap<SessionId, StudySession>,
    cards: Vec<Flashcard>,
    recommendations: VecDeque<String>,
    failures: HashMap<Operation, VecDeque<Failure>>,
    calls: Vec<RecordedCall>,
    token: Option<String>,
}

/// In-memory stand-in for the remote study service, for tests and offline demos.
///
/// Batches are served from a fixed card pool in insertion order, truncated to
/// the requested limit. Recommendations are scripted and default to `medium`.
#[derive(Clone, Default)]
pub struct InMemoryStudyApi {
    clock: Clock,
    state: Arc<Mutex<State>>,
    gates: Arc<Mutex<HashMap<Operation, Arc<Notify>>>>,
}

impl InMemoryStudyApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the card pool served by `fetch_card_batch`.
    #[must_use]
    pub fn with_cards(self, cards: Vec<Flashcard>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.cards = cards;
        }
        self
    }

    /// Queue estimator answers, returned one per call.
    pub fn script_recommendations<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.recommendations.extend(values.into_iter().map(Into::into));
        }
    }

    /// Make the next call of `op` fail with `failure`.
    pub fn fail_next(&self, op: Operation, failure: Failure) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.entry(op).or_default().push_back(failure);
        }
    }

    /// Hold every subsequent call of `op` until the returned gate is notified once
    /// per call.
    #[must_use]
    pub fn gate(&self, op: Operation) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        if let Ok(mut gates) = self.gates.lock() {
            gates.insert(op, Arc::clone(&notify));
        }
        notify
    }

    /// Calls received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .lock()
            .map(|state| state.calls.clone())
            .unwrap_or_default()
    }

    /// Answers received for a session, in arrival order.
    #[must_use]
    pub fn submitted_answers(&self, session_id: SessionId) -> Vec<AnswerEvent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::SubmitAnswer(event) if event.session_id == session_id => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Server-side view of a session.
    #[must_use]
    pub fn session(&self, id: SessionId) -> Option<StudySession> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.sessions.get(&id).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ApiError> {
        self.state
            .lock()
            .map_err(|e| ApiError::Unavailable(e.to_string()))
    }

    /// Record the call, wait on a gate if one is armed, then apply injected failures.
    async fn enter(&self, op: Operation, call: RecordedCall) -> Result<(), ApiError> {
        self.lock()?.calls.push(call);

        let gate = self
            .gates
            .lock()
            .map_err(|e| ApiError::Unavailable(e.to_string()))?
            .get(&op)
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock()?;
        if let Some(failure) = state.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            if failure == Failure::Unauthorized {
                state.token = None;
            }
            return Err(failure.into_error());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionApi for InMemoryStudyApi {
    async fn start_session(
        &self,
        topic: Option<&str>,
        target_count: u32,
    ) -> Result<StudySession, ApiError> {
        self.enter(
            Operation::StartSession,
            RecordedCall::StartSession {
                topic: topic.map(str::to_string),
                target_count,
            },
        )
        .await?;

        let mut state = self.lock()?;
        state.next_session_id += 1;
        let id = SessionId::new(state.next_session_id);
        let mut session = StudySession::new(id, topic.map(str::to_string));
        session.created_at = Some(self.clock.now());
        state.sessions.insert(id, session.clone());
        Ok(session)
    }

    async fn fetch_card_batch(
        &self,
        session_id: SessionId,
        tier: Option<DifficultyTier>,
        limit: u32,
    ) -> Result<Vec<Flashcard>, ApiError> {
        self.enter(
            Operation::FetchCardBatch,
            RecordedCall::FetchCardBatch {
                session_id,
                tier,
                limit,
            },
        )
        .await?;

        let state = self.lock()?;
        if !state.sessions.contains_key(&session_id) {
            return Err(ApiError::from_status(404, "Session not found"));
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(state.cards.iter().take(limit).cloned().collect())
    }

    async fn complete_session(&self, session_id: SessionId) -> Result<(), ApiError> {
        self.enter(
            Operation::CompleteSession,
            RecordedCall::CompleteSession(session_id),
        )
        .await?;

        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| ApiError::from_status(404, "Session not found"))?;
        if !session.is_completed() {
            session
                .complete(self.clock.now())
                .map_err(|e| ApiError::Rejected(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ScoringApi for InMemoryStudyApi {
    async fn submit_answer(&self, event: &AnswerEvent) -> Result<(), ApiError> {
        self.enter(Operation::SubmitAnswer, RecordedCall::SubmitAnswer(*event))
            .await
    }
}

#[async_trait]
impl DifficultyApi for InMemoryStudyApi {
    async fn recommend_difficulty(
        &self,
        session_id: SessionId,
    ) -> Result<TierRecommendation, ApiError> {
        self.enter(
            Operation::RecommendDifficulty,
            RecordedCall::RecommendDifficulty(session_id),
        )
        .await?;

        let mut state = self.lock()?;
        let recommended = state
            .recommendations
            .pop_front()
            .unwrap_or_else(|| DifficultyTier::Medium.as_str().to_string());
        Ok(TierRecommendation::new(recommended))
    }
}

#[async_trait]
impl GenerationApi for InMemoryStudyApi {
    async fn generate_from_text(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedCard>, ApiError> {
        self.enter(
            Operation::GenerateFromText,
            RecordedCall::GenerateFromText(request.clone()),
        )
        .await?;

        Ok((1..=request.num_cards)
            .map(|n| {
                GeneratedCard::new(
                    format!("{} question {n}", request.topic),
                    format!("{} answer {n}", request.topic),
                )
            })
            .collect())
    }
}

#[async_trait]
impl AuthApi for InMemoryStudyApi {
    async fn login(&self, email: &str, _password: &str) -> Result<AuthSession, ApiError> {
        self.enter(Operation::Login, RecordedCall::Login(email.to_string()))
            .await?;
        let token = format!("token-for-{email}");
        self.lock()?.token = Some(token.clone());
        Ok(AuthSession {
            access_token: token,
            username: email.split('@').next().map(str::to_string),
        })
    }

    async fn register(&self, _email: &str, _username: &str, _password: &str) -> Result<(), ApiError> {
        Ok(())
    }

    fn logout(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.token = None;
        }
    }

    fn is_authenticated(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.token.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::FlashcardId;
    use study_core::time::fixed_clock;

    fn card(id: u64) -> Flashcard {
        Flashcard::new(FlashcardId::new(id), format!("Q{id}"), format!("A{id}"), DifficultyTier::Medium)
    }

    #[tokio::test]
    async fn serves_cards_in_order_up_to_limit() {
        let api = InMemoryStudyApi::new()
            .with_clock(fixed_clock())
            .with_cards(vec![card(1), card(2), card(3)]);
        let session = api.start_session(Some("Biology"), 2).await.unwrap();

        let batch = api
            .fetch_card_batch(session.id(), Some(DifficultyTier::Hard), 2)
            .await
            .unwrap();
        let ids: Vec<_> = batch.iter().map(|c| c.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let api = InMemoryStudyApi::new();
        api.fail_next(Operation::RecommendDifficulty, Failure::Unavailable);

        let err = api.recommend_difficulty(SessionId::new(1)).await.unwrap_err();
        assert!(err.is_transient());

        let ok = api.recommend_difficulty(SessionId::new(1)).await.unwrap();
        assert_eq!(ok.recommended, "medium");
    }

    #[tokio::test]
    async fn injected_unauthorized_logs_out() {
        let api = InMemoryStudyApi::new();
        api.login("ada@example.com", "pw").await.unwrap();
        assert!(api.is_authenticated());

        api.fail_next(Operation::SubmitAnswer, Failure::Unauthorized);
        let event = AnswerEvent::new(SessionId::new(1), FlashcardId::new(1), true, 3);
        let err = api.submit_answer(&event).await.unwrap_err();

        assert!(err.is_auth());
        assert!(!api.is_authenticated());
    }

    #[tokio::test]
    async fn complete_marks_server_side_session() {
        let api = InMemoryStudyApi::new().with_clock(fixed_clock());
        let session = api.start_session(None, 5).await.unwrap();
        api.complete_session(session.id()).await.unwrap();
        assert!(api.session(session.id()).unwrap().is_completed());
    }
}
