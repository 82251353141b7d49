//! Abstract persistence contract the session engine depends on.
//!
//! Separates the kernel's domain logic from the underlying store
//! (PostgreSQL in `noesis-db`, an in-memory map for tests), enabling the
//! engine to be tested without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    Interaction, InteractionDraft, KcCatalogueEntry, NewSession, Question, Quiz, Session,
    SessionUpdate, User,
};

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Abstract contract for the kernel's persistence needs.
///
/// Implementations MUST provide serialisable-isolation (or equivalent) for
/// [`Repository::record_answer_atomically`] so that the no-duplicate-answer
/// invariant holds under concurrent requests on the same session.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>>;
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>>;
    /// Questions for a quiz, in authored order.
    async fn list_questions_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>>;
    /// The full knowledge-component catalogue, independent of any quiz.
    async fn get_kc_catalogue(&self) -> Result<Vec<KcCatalogueEntry>>;

    /// A session with its prior interactions attached, ascending by
    /// `created_at`.
    async fn get_session(&self, id: Uuid) -> Result<Option<(Session, Vec<Interaction>)>>;

    async fn create_session(&self, initial: NewSession) -> Result<Session>;

    /// All-or-nothing: appends `interaction` and overwrites the session's
    /// `theta`, `theta_sd`, and `kc_states` in one transaction. Fails with
    /// [`RepositoryError::Conflict`] if the session is completed or the
    /// question was already answered in this session.
    async fn record_answer_atomically(
        &self,
        session_id: Uuid,
        interaction: InteractionDraft,
        session_update: SessionUpdate,
    ) -> Result<Interaction>;

    /// Marks a session completed. Fails with [`RepositoryError::Conflict`]
    /// if it is already completed.
    async fn complete_session(&self, session_id: Uuid, completed_at: DateTime<Utc>) -> Result<Session>;
}
