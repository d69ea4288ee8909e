//! Web-service functions consumed by the mobile app, with their result cache.

pub mod cache;
pub mod domain;
pub mod router;
pub mod service;


pub use cache::{read_through, CacheEntry, CacheKey, MemoryCache, WsCache};
pub use router::mobile_router;
pub use service::{DirectoryError, MobileService, QuestionnaireDirectory};

use axum::http::StatusCode;

use crate::survey::domain::QuestionnaireId;
use crate::survey::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum MobileError {
    #[error("request carries no user")]
    Unauthenticated,
    #[error("missing capability {0}")]
    Forbidden(&'static str),
    #[error("questionnaire {0} not found")]
    QuestionnaireNotFound(QuestionnaireId),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MobileError {
    pub fn status(&self) -> StatusCode {
        match self {
            MobileError::Unauthenticated => StatusCode::UNAUTHORIZED,
            MobileError::Forbidden(_) => StatusCode::FORBIDDEN,
            MobileError::QuestionnaireNotFound(_) => StatusCode::NOT_FOUND,
            MobileError::Directory(_) | MobileError::Repository(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}
