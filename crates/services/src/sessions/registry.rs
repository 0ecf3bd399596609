use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use study_core::model::SessionId;
use tokio_util::sync::CancellationToken;

/// Cancellation tokens for study sessions that still have a live controller.
///
/// A controller checks its token after every remote call; cancelling it makes
/// any late response for that session a no-op.
#[derive(Debug, Default)]
pub struct ActiveSessions {
    tokens: Mutex<HashMap<SessionId, CancellationToken>>,
}

impl ActiveSessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<SessionId, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|poisoned| {
            tracing::error!("active session registry mutex poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Register a session and return its token. Re-registering cancels the
    /// previous token for the same id.
    pub fn register(&self, session_id: SessionId) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.guard().insert(session_id, token.clone()) {
            previous.cancel();
        }
        tracing::debug!(%session_id, "registered study session");
        token
    }

    /// Cancel a session's in-flight work. Returns `false` if it was not active.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        match self.guard().remove(&session_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(%session_id, "cancelled study session");
                true
            }
            None => false,
        }
    }

    /// Cancel every active session except `keep`.
    pub fn cancel_others(&self, keep: SessionId) -> usize {
        let mut guard = self.guard();
        let stale: Vec<SessionId> = guard.keys().copied().filter(|id| *id != keep).collect();
        for id in &stale {
            if let Some(token) = guard.remove(id) {
                token.cancel();
            }
        }
        stale.len()
    }

    /// Forget a finished session without cancelling anything.
    pub fn remove(&self, session_id: SessionId) {
        self.guard().remove(&session_id);
    }

    #[must_use]
    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.guard().contains_key(&session_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
