use serde::Serialize;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    /// 1-based position of the current card, 0 before cards are loaded.
    pub position: usize,
    pub answered: usize,
    pub remaining: usize,
}
