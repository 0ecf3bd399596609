use std::fmt;

use study_core::model::{Flashcard, SessionId, SessionStats, StudySession};

use super::progress::SessionProgress;

/// Result of moving the cursor past the current card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The cursor moved to the next card.
    HasNext,
    /// The current card was the last one; the session must be finalized.
    Exhausted,
}

/// Session-scoped study state: the session, its ordered cards, the cursor and
/// the running tally.
///
/// Every operation is synchronous and infallible; nothing here performs I/O.
#[derive(Default, Clone)]
pub struct SessionStore {
    session: Option<StudySession>,
    cards: Vec<Flashcard>,
    cursor: Option<usize>,
    stats: SessionStats,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session context. Cursor and stats start over.
    pub fn set_session(&mut self, session: StudySession) {
        self.session = Some(session);
        self.cards.clear();
        self.cursor = None;
        self.stats.reset();
    }

    /// Replace the card sequence and rewind the cursor.
    ///
    /// An empty sequence leaves the cursor unset ("nothing to study").
    pub fn set_cards(&mut self, cards: Vec<Flashcard>) {
        self.cursor = if cards.is_empty() { None } else { Some(0) };
        self.cards = cards;
    }

    /// Count one answer towards the running stats.
    pub fn record_answer(&mut self, is_correct: bool) {
        self.stats.record(is_correct);
    }

    /// Move to the next card, or report that the last card was reached.
    pub fn advance(&mut self) -> Advance {
        match self.cursor {
            Some(index) if index + 1 < self.cards.len() => {
                self.cursor = Some(index + 1);
                Advance::HasNext
            }
            _ => Advance::Exhausted,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&StudySession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut StudySession> {
        self.session.as_mut()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(StudySession::id)
    }

    #[must_use]
    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    #[must_use]
    pub fn current_card(&self) -> Option<&Flashcard> {
        self.cursor.and_then(|index| self.cards.get(index))
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = usize::try_from(self.stats.total()).unwrap_or(usize::MAX);
        let position = self.cursor.map_or(0, |index| index + 1);
        SessionProgress {
            total: self.cards.len(),
            position,
            answered,
            remaining: self.cards.len().saturating_sub(answered),
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session_id", &self.session_id())
            .field("cards_len", &self.cards.len())
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{DifficultyTier, FlashcardId};

    fn card(id: u64) -> Flashcard {
        Flashcard::new(FlashcardId::new(id), format!("Q{id}"), format!("A{id}"), DifficultyTier::Easy)
    }

    fn store_with(n: u64) -> SessionStore {
        let mut store = SessionStore::new();
        store.set_session(StudySession::new(SessionId::new(1), None));
        store.set_cards((1..=n).map(card).collect());
        store
    }

    #[test]
    fn set_cards_rewinds_cursor() {
        let mut store = store_with(3);
        assert_eq!(store.advance(), Advance::HasNext);
        assert_eq!(store.current_index(), Some(1));

        store.set_cards(vec![card(7), card(8)]);
        assert_eq!(store.current_index(), Some(0));
        assert_eq!(store.current_card().map(|c| c.id), Some(FlashcardId::new(7)));
    }

    #[test]
    fn empty_cards_leave_cursor_unset() {
        let mut store = store_with(0);
        assert_eq!(store.current_index(), None);
        assert!(store.current_card().is_none());
        assert_eq!(store.advance(), Advance::Exhausted);
    }

    #[test]
    fn advance_stops_at_last_index() {
        let mut store = store_with(3);
        assert_eq!(store.advance(), Advance::HasNext);
        assert_eq!(store.advance(), Advance::HasNext);
        assert_eq!(store.current_index(), Some(2));

        for _ in 0..3 {
            assert_eq!(store.advance(), Advance::Exhausted);
            assert_eq!(store.current_index(), Some(2));
        }
    }

    #[test]
    fn record_answer_keeps_invariants() {
        let mut store = store_with(4);
        let pattern = [true, false, true, true, false, false, true];
        let mut correct = 0_u32;
        for (i, is_correct) in pattern.into_iter().enumerate() {
            store.record_answer(is_correct);
            correct += u32::from(is_correct);
            let total = u32::try_from(i + 1).unwrap();
            let stats = store.stats();
            assert!(stats.correct() <= stats.total());
            assert_eq!(stats.total(), total);
            let expected = (f64::from(correct) * 1000.0 / f64::from(total)).round() / 10.0;
            assert_eq!(stats.accuracy(), expected);
        }
    }

    #[test]
    fn set_session_resets_stats_and_cursor() {
        let mut store = store_with(2);
        store.record_answer(true);
        store.set_session(StudySession::new(SessionId::new(2), Some("Chem".into())));

        assert_eq!(store.stats().total(), 0);
        assert_eq!(store.current_index(), None);
        assert!(store.cards().is_empty());
        assert_eq!(store.session_id(), Some(SessionId::new(2)));
    }

    #[test]
    fn progress_tracks_position_and_answers() {
        let mut store = store_with(3);
        store.record_answer(true);
        store.advance();
        let progress = store.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.position, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
    }
}
