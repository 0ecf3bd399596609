use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Raised by the strict parser when a value is not one of the three tiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty tier: {0:?}")]
pub struct UnknownTierError(pub String);

//
// ─── DIFFICULTY TIER ──────────────────────────────────────────────────────────
//

/// Difficulty level used to tag flashcards and to bias the next batch fetch.
///
/// The set is closed: anything received from the outside that is not one of
/// these three values is either rejected (`FromStr`) or coerced to `Medium`
/// (`coerce`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl DifficultyTier {
    pub const ALL: [DifficultyTier; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// Wire/display name of the tier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyTier::Easy => "easy",
            DifficultyTier::Medium => "medium",
            DifficultyTier::Hard => "hard",
        }
    }

    /// Lenient parse: unrecognised values fall back to `Medium`.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    /// Like [`coerce`](Self::coerce) but reports whether a fallback happened.
    #[must_use]
    pub fn coerce_checked(raw: &str) -> (Self, bool) {
        match raw.parse() {
            Ok(tier) => (tier, false),
            Err(_) => (Self::default(), true),
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyTier {
    type Err = UnknownTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(UnknownTierError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tiers_case_insensitively() {
        assert_eq!("easy".parse::<DifficultyTier>(), Ok(DifficultyTier::Easy));
        assert_eq!(" Hard ".parse::<DifficultyTier>(), Ok(DifficultyTier::Hard));
        assert_eq!("MEDIUM".parse::<DifficultyTier>(), Ok(DifficultyTier::Medium));
    }

    #[test]
    fn unknown_tier_coerces_to_medium() {
        assert_eq!(DifficultyTier::coerce("expert"), DifficultyTier::Medium);
        assert_eq!(
            DifficultyTier::coerce_checked(""),
            (DifficultyTier::Medium, true)
        );
        assert_eq!(
            DifficultyTier::coerce_checked("expert"),
            (DifficultyTier::Medium, true)
        );
        assert_eq!(
            DifficultyTier::coerce_checked("hard"),
            (DifficultyTier::Hard, false)
        );
    }

    #[test]
    fn every_tier_round_trips_through_its_name() {
        for tier in DifficultyTier::ALL {
            assert_eq!(DifficultyTier::coerce_checked(tier.as_str()), (tier, false));
        }
    }
}
