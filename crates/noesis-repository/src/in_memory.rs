//! In-memory reference implementation of [`Repository`], used by engine
//! unit/integration tests and the server's test fixtures. Not intended
//! for production use — see `noesis-db` for the PostgreSQL backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{
    Interaction, InteractionDraft, KcCatalogueEntry, NewSession, Question, Quiz, Session,
    SessionUpdate, User,
};
use crate::traits::{Repository, Result};

#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    quizzes: HashMap<Uuid, Quiz>,
    questions: HashMap<Uuid, Question>,
    kc_catalogue: Vec<KcCatalogueEntry>,
    sessions: HashMap<Uuid, Session>,
    interactions: HashMap<Uuid, Vec<Interaction>>,
}

/// A single shared lock over the whole store gives the in-memory
/// implementation the same atomicity guarantee a `SELECT ... FOR UPDATE`
/// transaction gives `noesis-db`'s PostgreSQL implementation.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_user(&self, user: User) {
        self.store.write().await.users.insert(user.id, user);
    }

    pub async fn seed_quiz(&self, quiz: Quiz) {
        self.store.write().await.quizzes.insert(quiz.id, quiz);
    }

    pub async fn seed_question(&self, question: Question) {
        self.store
            .write()
            .await
            .questions
            .insert(question.id, question);
    }

    pub async fn seed_kc_catalogue(&self, catalogue: Vec<KcCatalogueEntry>) {
        self.store.write().await.kc_catalogue = catalogue;
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.store.read().await.quizzes.get(&id).cloned())
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        Ok(self.store.read().await.questions.get(&id).cloned())
    }

    async fn list_questions_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let store = self.store.read().await;
        let mut questions: Vec<Question> = store
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn get_kc_catalogue(&self) -> Result<Vec<KcCatalogueEntry>> {
        Ok(self.store.read().await.kc_catalogue.clone())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<(Session, Vec<Interaction>)>> {
        let store = self.store.read().await;
        let Some(session) = store.sessions.get(&id).cloned() else {
            return Ok(None);
        };
        let interactions = store.interactions.get(&id).cloned().unwrap_or_default();
        Ok(Some((session, interactions)))
    }

    async fn create_session(&self, initial: NewSession) -> Result<Session> {
        let mut store = self.store.write().await;
        let session = Session {
            id: Uuid::new_v4(),
            user_id: initial.user_id,
            quiz_id: initial.quiz_id,
            condition: initial.condition,
            started_at: Utc::now(),
            completed_at: None,
            theta: initial.theta,
            theta_sd: initial.theta_sd,
            kc_states: initial.kc_states,
        };
        store.sessions.insert(session.id, session.clone());
        store.interactions.insert(session.id, Vec::new());
        Ok(session)
    }

    async fn record_answer_atomically(
        &self,
        session_id: Uuid,
        interaction: InteractionDraft,
        session_update: SessionUpdate,
    ) -> Result<Interaction> {
        let mut store = self.store.write().await;

        let session = store
            .sessions
            .get(&session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {session_id}")))?;
        if session.is_completed() {
            return Err(RepositoryError::Conflict(format!(
                "session {session_id} is already completed"
            )));
        }

        let existing = store
            .interactions
            .get(&session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {session_id}")))?;
        if existing
            .iter()
            .any(|i| i.question_id == interaction.question_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "question {} already answered in session {session_id}",
                interaction.question_id
            )));
        }

        let record = Interaction {
            id: Uuid::new_v4(),
            session_id,
            question_id: interaction.question_id,
            selected_answer: interaction.selected_answer,
            is_correct: interaction.is_correct,
            response_time_ms: interaction.response_time_ms,
            theta_before: interaction.theta_before,
            theta_after: interaction.theta_after,
            p_learned_before: interaction.p_learned_before,
            p_learned_after: interaction.p_learned_after,
            created_at: Utc::now(),
        };

        store
            .interactions
            .get_mut(&session_id)
            .expect("checked above")
            .push(record.clone());

        let session = store.sessions.get_mut(&session_id).expect("checked above");
        session.theta = session_update.theta;
        session.theta_sd = session_update.theta_sd;
        session.kc_states = session_update.kc_states;

        Ok(record)
    }

    async fn complete_session(&self, session_id: Uuid, completed_at: DateTime<Utc>) -> Result<Session> {
        let mut store = self.store.write().await;
        let session = store
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {session_id}")))?;
        if session.is_completed() {
            return Err(RepositoryError::Conflict(format!(
                "session {session_id} is already completed"
            )));
        }
        session.completed_at = Some(completed_at);
        Ok(session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerLabel;

    fn draft(question_id: Uuid) -> InteractionDraft {
        InteractionDraft {
            question_id,
            selected_answer: AnswerLabel::A,
            is_correct: true,
            response_time_ms: 1200,
            theta_before: -0.78,
            theta_after: -0.5,
            p_learned_before: 0.6,
            p_learned_after: 0.88,
        }
    }

    fn update() -> SessionUpdate {
        SessionUpdate {
            theta: -0.5,
            theta_sd: 0.4,
            kc_states: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected() {
        let repo = InMemoryRepository::new();
        let session = repo
            .create_session(NewSession {
                user_id: Uuid::new_v4(),
                quiz_id: Uuid::new_v4(),
                condition: crate::models::Condition::Adaptive,
                theta: -0.78,
                theta_sd: 0.543,
                kc_states: HashMap::new(),
            })
            .await
            .unwrap();

        let question_id = Uuid::new_v4();
        repo.record_answer_atomically(session.id, draft(question_id), update())
            .await
            .unwrap();

        let result = repo
            .record_answer_atomically(session.id, draft(question_id), update())
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn completed_session_rejects_further_answers() {
        let repo = InMemoryRepository::new();
        let session = repo
            .create_session(NewSession {
                user_id: Uuid::new_v4(),
                quiz_id: Uuid::new_v4(),
                condition: crate::models::Condition::Adaptive,
                theta: -0.78,
                theta_sd: 0.543,
                kc_states: HashMap::new(),
            })
            .await
            .unwrap();

        repo.complete_session(session.id, Utc::now()).await.unwrap();

        let result = repo
            .record_answer_atomically(session.id, draft(Uuid::new_v4()), update())
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let result = repo.complete_session(session.id, Utc::now()).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }
}
