#![forbid(unsafe_code)]

pub mod account_service;
pub mod app_services;
pub mod error;
pub mod generation_service;
pub mod sessions;

pub use study_core::Clock;

pub use account_service::AccountService;
pub use app_services::AppServices;
pub use error::{ErrorKind, ServiceError, StateError, ValidationError};
pub use generation_service::GenerationService;

pub use sessions::{
    AnswerReport, CardView, CompletionReason, ControllerSnapshot, LoadOutcome, NextStep,
    ResubmitReport, SessionCompletion, SessionOutcome, StudyController, StudyLoopService,
    StudyPhase,
};
