use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use study_api::{DifficultyApi, ScoringApi, SessionApi};
use study_core::model::{
    AnswerEvent, DifficultyTier, FlashcardId, SessionId, StudySession,
};
use study_core::time::response_time_seconds;
use tokio_util::sync::CancellationToken;

use crate::Clock;
use crate::error::{ServiceError, StateError};
use super::registry::ActiveSessions;
use super::store::{Advance, SessionStore};
use super::view::{
    AnswerReport, CardView, CompletionReason, ControllerSnapshot, LoadOutcome, NextStep,
    ResubmitReport, SessionCompletion, SessionOutcome, StudyPhase,
};

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

struct Inner {
    clock: Clock,
    store: SessionStore,
    phase: StudyPhase,
    tier: DifficultyTier,
    target_count: u32,
    presented_at: Option<DateTime<Utc>>,
    in_flight: bool,
    /// Failed submissions. A card id presented twice keeps only its latest event.
    pending: BTreeMap<(SessionId, FlashcardId), AnswerEvent>,
    outcome: Option<SessionOutcome>,
}

impl Inner {
    fn card_view(&self) -> Option<CardView> {
        let card = self.store.current_card()?;
        let index = self.store.current_index()?;
        Some(CardView {
            flashcard_id: card.id,
            position: index + 1,
            total: self.store.cards().len(),
            question: card.question.clone(),
            answer: (self.phase == StudyPhase::Revealed).then(|| card.answer.clone()),
            difficulty: card.difficulty,
        })
    }

    /// Show the card under the cursor and restart its response clock.
    fn present_current(&mut self) -> Option<CardView> {
        self.phase = StudyPhase::Presenting;
        self.presented_at = Some(self.clock.now());
        self.card_view()
    }
}

/// Identifies the session an in-flight request belongs to.
#[derive(Clone)]
struct Ticket {
    session_id: SessionId,
    token: CancellationToken,
}

enum Guarded<T> {
    Done(T),
    Discarded,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives one study session end to end.
///
/// The controller owns the session's [`SessionStore`] and is the only place
/// that calls the remote collaborators. At most one remote transition runs at a
/// time: while a fetch, submission or recompute is outstanding, `load_cards`,
/// `reveal` and `answer` fail with [`StateError::Busy`]. `end_session` is
/// always allowed before completion and cancels whatever is in flight; late
/// responses for a cancelled session are dropped without touching state.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct StudyController {
    session_id: SessionId,
    sessions: Arc<dyn SessionApi>,
    scoring: Arc<dyn ScoringApi>,
    difficulty: Arc<dyn DifficultyApi>,
    registry: Arc<ActiveSessions>,
    token: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl StudyController {
    /// Wrap an already started session. The controller begins in `Loading`.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        session: StudySession,
        target_count: u32,
        sessions: Arc<dyn SessionApi>,
        scoring: Arc<dyn ScoringApi>,
        difficulty: Arc<dyn DifficultyApi>,
        registry: Arc<ActiveSessions>,
    ) -> Self {
        let session_id = session.id();
        let token = registry.register(session_id);
        let mut store = SessionStore::new();
        store.set_session(session);

        Self {
            session_id,
            sessions,
            scoring,
            difficulty,
            registry,
            token,
            inner: Arc::new(Mutex::new(Inner {
                clock,
                store,
                phase: StudyPhase::Loading,
                tier: DifficultyTier::default(),
                target_count,
                presented_at: None,
                in_flight: false,
                pending: BTreeMap::new(),
                outcome: None,
            })),
        }
    }

    /// Start with a specific tier instead of `medium`.
    #[must_use]
    pub fn with_initial_tier(self, tier: DifficultyTier) -> Self {
        self.lock().tier = tier;
        self
    }

    /// Replace the time source used for presentation and answer timestamps.
    pub fn set_clock(&self, clock: Clock) {
        self.lock().clock = clock;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!(session_id = %self.session_id, "controller mutex poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            session_id: self.session_id,
            token: self.token.clone(),
        }
    }

    fn is_stale(&self, ticket: &Ticket, inner: &Inner) -> bool {
        ticket.token.is_cancelled() || inner.store.session_id() != Some(ticket.session_id)
    }

    /// Await a remote call unless the session is cancelled first.
    async fn guarded<T>(&self, ticket: &Ticket, call: impl Future<Output = T>) -> Guarded<T> {
        tokio::select! {
            biased;
            () = ticket.token.cancelled() => Guarded::Discarded,
            value = call => Guarded::Done(value),
        }
    }

    /// Reject actions on a session that was cancelled from outside.
    fn ensure_live(&self, inner: &Inner) -> Result<(), StateError> {
        if inner.phase == StudyPhase::Completed {
            return Err(StateError::SessionCompleted);
        }
        if self.token.is_cancelled() && inner.phase != StudyPhase::Completing {
            return Err(StateError::Superseded(self.session_id));
        }
        Ok(())
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> StudyPhase {
        self.lock().phase
    }

    #[must_use]
    pub fn tier(&self) -> DifficultyTier {
        self.lock().tier
    }

    #[must_use]
    pub fn current_card(&self) -> Option<CardView> {
        let inner = self.lock();
        match inner.phase {
            StudyPhase::Presenting | StudyPhase::Revealed => inner.card_view(),
            _ => None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        let inner = self.lock();
        let stats = inner.store.stats();
        ControllerSnapshot {
            session_id: self.session_id,
            phase: inner.phase,
            in_flight: inner.in_flight,
            stats,
            accuracy: stats.accuracy(),
            tier: inner.tier,
            progress: inner.store.progress(),
            pending_answers: inner.pending.len(),
        }
    }

    /// Final numbers, once the session has completed.
    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.lock().outcome.clone()
    }

    /// Fetch the card batch for the current tier.
    ///
    /// On failure the controller stays in `Loading` so the caller can retry.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::State` outside `Loading` or while busy, and
    /// `ServiceError::Api` if the fetch fails.
    pub async fn load_cards(&self) -> Result<LoadOutcome, ServiceError> {
        let request = {
            let mut inner = self.lock();
            self.ensure_live(&inner)?;
            if inner.in_flight {
                return Err(StateError::Busy.into());
            }
            if inner.phase != StudyPhase::Loading {
                return Err(StateError::InvalidPhase {
                    action: "load cards",
                    phase: inner.phase,
                }
                .into());
            }
            if inner.target_count == 0 {
                inner.phase = StudyPhase::Completing;
                None
            } else {
                inner.in_flight = true;
                Some((inner.tier, inner.target_count))
            }
        };

        let Some((tier, limit)) = request else {
            tracing::info!(session_id = %self.session_id, "no cards requested, completing");
            let completion = self.finish(CompletionReason::EmptyCardSet).await;
            return Ok(LoadOutcome::Empty(completion));
        };
        let ticket = self.ticket();

        tracing::debug!(session_id = %self.session_id, %tier, limit, "fetching card batch");
        let fetched = match self
            .guarded(
                &ticket,
                self.sessions
                    .fetch_card_batch(ticket.session_id, Some(tier), limit),
            )
            .await
        {
            Guarded::Done(result) => result,
            Guarded::Discarded => return Ok(LoadOutcome::Discarded),
        };

        let view = {
            let mut inner = self.lock();
            if self.is_stale(&ticket, &inner) {
                return Ok(LoadOutcome::Discarded);
            }
            inner.in_flight = false;
            let cards = match fetched {
                Ok(cards) => cards,
                Err(err) => {
                    tracing::warn!(session_id = %self.session_id, error = %err, "card batch fetch failed");
                    return Err(err.into());
                }
            };

            tracing::info!(session_id = %self.session_id, count = cards.len(), "card batch loaded");
            inner.store.set_cards(cards);
            if inner.store.current_card().is_none() {
                inner.phase = StudyPhase::Completing;
                None
            } else {
                inner.present_current()
            }
        };

        match view {
            Some(view) => Ok(LoadOutcome::Ready(view)),
            None => {
                let completion = self.finish(CompletionReason::EmptyCardSet).await;
                Ok(LoadOutcome::Empty(completion))
            }
        }
    }

    /// Show the current card's answer.
    ///
    /// # Errors
    ///
    /// Returns `StateError` unless a question is being presented and nothing is in flight.
    pub fn reveal(&self) -> Result<CardView, ServiceError> {
        let mut inner = self.lock();
        self.ensure_live(&inner)?;
        if inner.in_flight {
            return Err(StateError::Busy.into());
        }
        if inner.phase != StudyPhase::Presenting {
            return Err(StateError::InvalidPhase {
                action: "reveal",
                phase: inner.phase,
            }
            .into());
        }
        inner.phase = StudyPhase::Revealed;
        inner.card_view().ok_or_else(|| {
            StateError::InvalidPhase {
                action: "reveal",
                phase: StudyPhase::Revealed,
            }
            .into()
        })
    }

    /// Score the revealed card, report it, refresh the tier and move on.
    ///
    /// The local tally is updated before any remote call and is never rolled
    /// back. Submission and estimator failures end up in the report; they do
    /// not stop the session from advancing.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if no revealed card is waiting for a score or a
    /// request is already in flight.
    pub async fn answer(&self, is_correct: bool) -> Result<AnswerReport, ServiceError> {
        let (ticket, event) = {
            let mut inner = self.lock();
            self.ensure_live(&inner)?;
            if inner.in_flight {
                return Err(StateError::Busy.into());
            }
            match inner.phase {
                StudyPhase::Revealed => {}
                StudyPhase::Presenting => return Err(StateError::NotRevealed.into()),
                phase => {
                    return Err(StateError::InvalidPhase {
                        action: "answer",
                        phase,
                    }
                    .into());
                }
            }
            let card_id = inner
                .store
                .current_card()
                .map(|card| card.id)
                .ok_or(StateError::InvalidPhase {
                    action: "answer",
                    phase: inner.phase,
                })?;

            let now = inner.clock.now();
            let seconds = response_time_seconds(inner.presented_at.unwrap_or(now), now);
            let event = AnswerEvent::new(self.session_id, card_id, is_correct, seconds);

            inner.store.record_answer(is_correct);
            inner.phase = StudyPhase::Scoring;
            inner.in_flight = true;
            (self.ticket(), event)
        };

        tracing::debug!(
            session_id = %self.session_id,
            flashcard_id = %event.flashcard_id,
            is_correct,
            response_time_seconds = event.response_time_seconds,
            "scoring card"
        );

        let submit_error = match self
            .guarded(&ticket, self.scoring.submit_answer(&event))
            .await
        {
            Guarded::Done(Ok(())) => None,
            Guarded::Done(Err(err)) => Some(err),
            Guarded::Discarded => return Ok(self.discarded_report(event)),
        };
        if let Some(err) = &submit_error {
            tracing::warn!(
                session_id = %self.session_id,
                flashcard_id = %event.flashcard_id,
                error = %err,
                "answer submission failed, keeping it for explicit resubmission"
            );
            let mut inner = self.lock();
            if !self.is_stale(&ticket, &inner) {
                inner.pending.insert(event.dedup_key(), event);
            }
        }

        let recommendation = match self
            .guarded(&ticket, self.difficulty.recommend_difficulty(self.session_id))
            .await
        {
            Guarded::Done(result) => result,
            Guarded::Discarded => return Ok(self.discarded_report(event)),
        };

        let (stats, tier, tier_coerced, difficulty_error, next_view) = {
            let mut inner = self.lock();
            if self.is_stale(&ticket, &inner) {
                drop(inner);
                return Ok(self.discarded_report(event));
            }

            let mut tier_coerced = false;
            let difficulty_error = match recommendation {
                Ok(recommendation) => {
                    let (tier, coerced) = DifficultyTier::coerce_checked(&recommendation.recommended);
                    if coerced {
                        tracing::warn!(
                            session_id = %self.session_id,
                            raw = %recommendation.recommended,
                            "unknown difficulty tier from estimator, using medium"
                        );
                    }
                    tier_coerced = coerced;
                    inner.tier = tier;
                    None
                }
                Err(err) => {
                    tracing::warn!(session_id = %self.session_id, error = %err, "difficulty recompute failed, keeping current tier");
                    Some(err)
                }
            };

            inner.in_flight = false;
            let next = match inner.store.advance() {
                Advance::HasNext => inner.present_current(),
                Advance::Exhausted => {
                    inner.phase = StudyPhase::Completing;
                    None
                }
            };
            (inner.store.stats(), inner.tier, tier_coerced, difficulty_error, next)
        };

        let next = match next_view {
            Some(view) => NextStep::Present(view),
            None => NextStep::Completed(self.finish(CompletionReason::Exhausted).await),
        };

        Ok(AnswerReport {
            event,
            stats,
            accuracy: stats.accuracy(),
            tier,
            tier_coerced,
            submit_error,
            difficulty_error,
            next,
        })
    }

    fn discarded_report(&self, event: AnswerEvent) -> AnswerReport {
        tracing::info!(
            session_id = %self.session_id,
            flashcard_id = %event.flashcard_id,
            "session ended while scoring, discarding response"
        );
        let inner = self.lock();
        let stats = inner.store.stats();
        AnswerReport {
            event,
            stats,
            accuracy: stats.accuracy(),
            tier: inner.tier,
            tier_coerced: false,
            submit_error: None,
            difficulty_error: None,
            next: NextStep::Discarded,
        }
    }

    /// End the session now. The current card, if unanswered, is not scored.
    ///
    /// Any request still in flight is cancelled and its response discarded.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the session is already completing or completed.
    pub async fn end_session(&self) -> Result<SessionCompletion, ServiceError> {
        {
            let mut inner = self.lock();
            match inner.phase {
                StudyPhase::Completed => return Err(StateError::SessionCompleted.into()),
                StudyPhase::Completing => {
                    return Err(StateError::InvalidPhase {
                        action: "end session",
                        phase: StudyPhase::Completing,
                    }
                    .into());
                }
                _ => {}
            }
            if inner.in_flight {
                tracing::info!(session_id = %self.session_id, "ending session with a request in flight");
            }
            self.token.cancel();
            inner.in_flight = false;
            inner.phase = StudyPhase::Completing;
        }
        Ok(self.finish(CompletionReason::EndedEarly).await)
    }

    /// Leave the session without completing it remotely.
    ///
    /// In-flight work is cancelled; every later action on this controller
    /// fails with [`StateError::Superseded`].
    pub fn abandon(&self) {
        let mut inner = self.lock();
        if inner.phase == StudyPhase::Completed {
            return;
        }
        self.token.cancel();
        self.registry.remove(self.session_id);
        inner.in_flight = false;
        tracing::info!(session_id = %self.session_id, phase = ?inner.phase, "study session abandoned");
    }

    /// Send the remote completion and move to `Completed`, whatever the call returns.
    async fn finish(&self, reason: CompletionReason) -> SessionCompletion {
        let result = self.sessions.complete_session(self.session_id).await;
        self.token.cancel();
        self.registry.remove(self.session_id);

        let mut inner = self.lock();
        let completion_error = match result {
            Ok(()) => {
                let now = inner.clock.now();
                if let Some(session) = inner.store.session_mut() {
                    let _ = session.complete(now);
                }
                None
            }
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, error = %err, "session completion failed, leaving anyway");
                Some(err)
            }
        };

        inner.phase = StudyPhase::Completed;
        inner.in_flight = false;
        inner.presented_at = None;

        let stats = inner.store.stats();
        let outcome = SessionOutcome {
            session_id: self.session_id,
            reason,
            empty_card_set: reason == CompletionReason::EmptyCardSet,
            stats,
            accuracy: stats.accuracy(),
            cards_total: inner.store.cards().len(),
            final_tier: inner.tier,
        };
        inner.outcome = Some(outcome.clone());
        tracing::info!(
            session_id = %self.session_id,
            ?reason,
            correct = stats.correct(),
            total = stats.total(),
            "study session completed"
        );

        SessionCompletion {
            outcome,
            completion_error,
        }
    }

    /// Re-send answers whose submission failed, each at most once per call.
    ///
    /// Acknowledged answers leave the pending set, so an answer is never
    /// delivered twice through this path.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Busy` while another request is in flight.
    pub async fn resubmit_pending(&self) -> Result<ResubmitReport, ServiceError> {
        let events: Vec<AnswerEvent> = {
            let mut inner = self.lock();
            if inner.in_flight {
                return Err(StateError::Busy.into());
            }
            if inner.pending.is_empty() {
                return Ok(ResubmitReport::default());
            }
            inner.in_flight = true;
            inner.pending.values().copied().collect()
        };

        let mut report = ResubmitReport::default();
        for event in events {
            match self.scoring.submit_answer(&event).await {
                Ok(()) => {
                    self.lock().pending.remove(&event.dedup_key());
                    report.delivered.push(event.flashcard_id);
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        flashcard_id = %event.flashcard_id,
                        error = %err,
                        "resubmission failed"
                    );
                    let auth = err.is_auth();
                    report.last_error = Some(err);
                    if auth {
                        break;
                    }
                }
            }
        }

        let mut inner = self.lock();
        inner.in_flight = false;
        report.still_pending = inner.pending.len();
        Ok(report)
    }

    /// Answers waiting for an explicit resubmission.
    #[must_use]
    pub fn pending_answers(&self) -> Vec<AnswerEvent> {
        self.lock().pending.values().copied().collect()
    }
}

impl fmt::Debug for StudyController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("StudyController")
            .field("session_id", &self.session_id)
            .field("phase", &inner.phase)
            .field("tier", &inner.tier)
            .field("in_flight", &inner.in_flight)
            .field("store", &inner.store)
            .finish_non_exhaustive()
    }
}
