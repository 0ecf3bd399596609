use thiserror::Error;

use crate::model::{ParseIdError, StudySessionError, UnknownTierError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Session(#[from] StudySessionError),
    #[error(transparent)]
    Tier(#[from] UnknownTierError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
