mod controller;
mod progress;
mod registry;
mod store;
mod view;
mod workflow;

// Public API of the study session subsystem.
pub use controller::StudyController;
pub use progress::SessionProgress;
pub use registry::ActiveSessions;
pub use store::{Advance, SessionStore};
pub use view::{
    AnswerReport, CardView, CompletionReason, ControllerSnapshot, LoadOutcome, NextStep,
    ResubmitReport, SessionCompletion, SessionOutcome, StudyPhase,
};
pub use workflow::StudyLoopService;
