mod answer;
mod card;
mod ids;
mod session;
mod stats;
mod tier;

pub use ids::{FlashcardId, ParseIdError, SessionId};

pub use answer::AnswerEvent;
pub use card::{Flashcard, GeneratedCard};
pub use session::{SessionStatus, StudySession, StudySessionError};
pub use stats::SessionStats;
pub use tier::{DifficultyTier, UnknownTierError};
