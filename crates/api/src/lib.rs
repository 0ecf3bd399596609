#![forbid(unsafe_code)]

pub mod config;
pub mod contract;
pub mod error;
pub mod http;
pub mod in_memory;

pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use contract::{
    AuthApi, AuthSession, DifficultyApi, GenerationApi, GenerationRequest, Remote, ScoringApi,
    SessionApi, TierRecommendation,
};
pub use error::ApiError;
pub use http::{Credentials, HttpStudyApi};
pub use in_memory::{Failure, InMemoryStudyApi, Operation, RecordedCall};
