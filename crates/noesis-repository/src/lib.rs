//! Persistence contract and domain models for the adaptive assessment
//! kernel, plus an in-memory reference implementation and the
//! UK-Geography seed fixtures shared by engine and server tests.

mod error;
mod in_memory;
pub mod fixtures;
mod models;
mod traits;

pub use error::RepositoryError;
pub use in_memory::InMemoryRepository;
pub use models::{
    AnswerLabel, AnswerOption, Condition, Interaction, InteractionDraft, KcCatalogueEntry,
    NewSession, Question, Quiz, Session, SessionUpdate, User,
};
pub use traits::{Repository, Result};
