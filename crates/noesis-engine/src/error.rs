//! The session engine's error taxonomy, realizing the kernel's abstract
//! error kinds (`InvalidArgument`, `NotFound`, `Conflict`, `NumericError`,
//! `Internal`) as a single `thiserror` enum. The HTTP layer maps each
//! variant onto a status code via its own `ApiError`.

use noesis_bkt::BktError;
use noesis_irt::IrtError;
use noesis_repository::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("numeric error: {0}")]
    NumericError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for failures a caller may safely retry without violating any
    /// kernel invariant.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }

    /// True for failures caused by caller input rather than server state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidArgument(_) | EngineError::NotFound(_) | EngineError::Conflict(_)
        )
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidArgument(msg) => EngineError::InvalidArgument(msg),
            RepositoryError::NotFound(msg) => EngineError::NotFound(msg),
            RepositoryError::Conflict(msg) => EngineError::Conflict(msg),
            RepositoryError::Internal(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<IrtError> for EngineError {
    fn from(err: IrtError) -> Self {
        let IrtError::NumericError(msg) = err;
        tracing::error!(error = %msg, "IRT numeric error");
        EngineError::NumericError(msg)
    }
}

impl From<BktError> for EngineError {
    fn from(err: BktError) -> Self {
        let BktError::NumericError(msg) = err;
        tracing::error!(error = %msg, "BKT numeric error");
        EngineError::NumericError(msg)
    }
}
