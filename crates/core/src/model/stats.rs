use serde::Serialize;

/// Running correctness tally for the active session.
///
/// `correct <= total` always holds; both only grow until the next session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionStats {
    correct: u32,
    total: u32,
}

impl SessionStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Percentage of correct answers rounded to one decimal place, `0.0` before
    /// the first answer.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.correct) * 1000.0 / f64::from(self.total)).round() / 10.0
    }

    /// Count one answer.
    pub fn record(&mut self, is_correct: bool) {
        self.total = self.total.saturating_add(1);
        if is_correct {
            self.correct = self.correct.saturating_add(1);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stats_have_zero_accuracy() {
        let stats = SessionStats::new();
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.accuracy(), 0.0);
    }

    #[test]
    fn accuracy_rounds_to_one_decimal() {
        let mut stats = SessionStats::new();
        stats.record(true);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.accuracy(), 66.7);

        stats.record(false);
        stats.record(false);
        stats.record(false);
        assert_eq!(stats.accuracy(), 33.3);
        assert_eq!((stats.correct(), stats.total()), (2, 6));
    }

    #[test]
    fn correct_never_exceeds_total() {
        let mut stats = SessionStats::new();
        for i in 0..50 {
            stats.record(i % 3 != 0);
            assert!(stats.correct() <= stats.total());
        }
        stats.reset();
        assert_eq!(stats, SessionStats::default());
    }
}
