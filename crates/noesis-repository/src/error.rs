//! Repository-layer error taxonomy.
//!
//! `InvalidArgument`, `NotFound`, `Conflict`, `Internal`. `NumericError`
//! originates in `noesis-irt`/`noesis-bkt` and is surfaced by the engine,
//! not the repository.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal repository error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Transient failures a caller may retry without violating any
    /// kernel invariant.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Internal(_))
    }
}
