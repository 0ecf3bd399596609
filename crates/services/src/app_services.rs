use std::sync::Arc;

use study_api::{ApiError, ClientConfig, HttpStudyApi, InMemoryStudyApi, Remote};

use crate::account_service::AccountService;
use crate::generation_service::GenerationService;
use crate::sessions::StudyLoopService;
use crate::Clock;

/// Assembles app-facing services over one remote backend.
#[derive(Clone)]
pub struct AppServices {
    study_loop: Arc<StudyLoopService>,
    generation: Arc<GenerationService>,
    accounts: Arc<AccountService>,
}

impl AppServices {
    /// Build services backed by the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be constructed.
    pub fn from_config(config: ClientConfig, clock: Clock) -> Result<Self, ApiError> {
        tracing::debug!(base_url = %config.base_url, "connecting to study service");
        let api = HttpStudyApi::new(config)?;
        Ok(Self::from_remote(&Remote::from_single(api), clock))
    }

    /// Build services backed by the in-memory fake.
    #[must_use]
    pub fn in_memory(api: InMemoryStudyApi, clock: Clock) -> Self {
        Self::from_remote(&Remote::from_single(api), clock)
    }

    #[must_use]
    pub fn from_remote(remote: &Remote, clock: Clock) -> Self {
        Self {
            study_loop: Arc::new(StudyLoopService::from_remote(clock, remote)),
            generation: Arc::new(GenerationService::new(Arc::clone(&remote.generation))),
            accounts: Arc::new(AccountService::new(Arc::clone(&remote.auth))),
        }
    }

    #[must_use]
    pub fn study_loop(&self) -> Arc<StudyLoopService> {
        Arc::clone(&self.study_loop)
    }

    #[must_use]
    pub fn generation(&self) -> Arc<GenerationService> {
        Arc::clone(&self.generation)
    }

    #[must_use]
    pub fn accounts(&self) -> Arc<AccountService> {
        Arc::clone(&self.accounts)
    }
}
