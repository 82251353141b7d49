//! PostgreSQL-backed [`Repository`] implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use noesis_bkt::{KcParams, KcState};
use noesis_irt::ItemParams;
use noesis_repository::{
    AnswerOption, Interaction, InteractionDraft, KcCatalogueEntry, NewSession, Question, Quiz,
    Repository, RepositoryError, Result, Session, SessionUpdate, User,
};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Postgres, Row};
use std::collections::HashMap;
use uuid::Uuid;

fn db_err(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Internal(err.to_string())
}

fn row_to_question(row: &PgRow) -> std::result::Result<Question, RepositoryError> {
    let options: serde_json::Value = row.try_get("options").map_err(db_err)?;
    let options: Vec<AnswerOption> =
        serde_json::from_value(options).map_err(|e| RepositoryError::Internal(e.to_string()))?;
    Ok(Question {
        id: row.try_get("id").map_err(db_err)?,
        quiz_id: row.try_get("quiz_id").map_err(db_err)?,
        stem: row.try_get("stem").map_err(db_err)?,
        options,
        params: ItemParams::new(
            row.try_get("a").map_err(db_err)?,
            row.try_get("b").map_err(db_err)?,
            row.try_get("c").map_err(db_err)?,
        ),
        bloom: row.try_get::<i16, _>("bloom").map_err(db_err)? as u8,
        kc: row.try_get("kc").map_err(db_err)?,
        order: row.try_get::<i32, _>("item_order").map_err(db_err)? as u32,
    })
}

fn row_to_session(row: &PgRow) -> std::result::Result<Session, RepositoryError> {
    let condition_raw: String = row.try_get("condition").map_err(db_err)?;
    let condition = condition_raw
        .parse()
        .map_err(|_| RepositoryError::Internal(format!("unknown condition {condition_raw}")))?;
    let kc_states_raw: serde_json::Value = row.try_get("kc_states").map_err(db_err)?;
    let kc_states: HashMap<String, KcState> = serde_json::from_value(kc_states_raw)
        .map_err(|e| RepositoryError::Internal(e.to_string()))?;

    Ok(Session {
        id: row.try_get("id").map_err(db_err)?,
        user_id: row.try_get("user_id").map_err(db_err)?,
        quiz_id: row.try_get("quiz_id").map_err(db_err)?,
        condition,
        started_at: row.try_get("started_at").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
        theta: row.try_get("theta").map_err(db_err)?,
        theta_sd: row.try_get("theta_sd").map_err(db_err)?,
        kc_states,
    })
}

fn row_to_interaction(row: &PgRow) -> std::result::Result<Interaction, RepositoryError> {
    let selected_answer_raw: String = row.try_get("selected_answer").map_err(db_err)?;
    let selected_answer = selected_answer_raw
        .parse()
        .map_err(|_| RepositoryError::Internal(format!("bad selected_answer {selected_answer_raw}")))?;

    Ok(Interaction {
        id: row.try_get("id").map_err(db_err)?,
        session_id: row.try_get("session_id").map_err(db_err)?,
        question_id: row.try_get("question_id").map_err(db_err)?,
        selected_answer,
        is_correct: row.try_get("is_correct").map_err(db_err)?,
        response_time_ms: row.try_get::<i64, _>("response_time_ms").map_err(db_err)? as u64,
        theta_before: row.try_get("theta_before").map_err(db_err)?,
        theta_after: row.try_get("theta_after").map_err(db_err)?,
        p_learned_before: row.try_get("p_learned_before").map_err(db_err)?,
        p_learned_after: row.try_get("p_learned_after").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

/// `Repository` implementation backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Convenience constructor for binaries that only need a connection
    /// string, mirroring [`crate::Migrator::from_url`].
    pub async fn connect(database_url: &str) -> std::result::Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(db_err)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query::<Postgres>("SELECT id FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| User { id: r.get("id") }))
    }

    async fn get_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        let row = sqlx::query::<Postgres>("SELECT id FROM quizzes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|r| Quiz { id: r.get("id") }))
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>> {
        let row = sqlx::query::<Postgres>(
            "SELECT id, quiz_id, stem, options, a, b, c, bloom, kc, item_order \
             FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(row_to_question).transpose()
    }

    async fn list_questions_for_quiz(&self, quiz_id: Uuid) -> Result<Vec<Question>> {
        let rows = sqlx::query::<Postgres>(
            "SELECT id, quiz_id, stem, options, a, b, c, bloom, kc, item_order \
             FROM questions WHERE quiz_id = $1 ORDER BY item_order",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(row_to_question).collect()
    }

    async fn get_kc_catalogue(&self) -> Result<Vec<KcCatalogueEntry>> {
        let rows = sqlx::query::<Postgres>("SELECT kc_id, p_l0, p_t, p_s, p_g FROM kc_params")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| KcCatalogueEntry {
                kc_id: row.get("kc_id"),
                params: KcParams {
                    p_l0: row.get("p_l0"),
                    p_t: row.get("p_t"),
                    p_s: row.get("p_s"),
                    p_g: row.get("p_g"),
                },
            })
            .collect())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<(Session, Vec<Interaction>)>> {
        let row = sqlx::query::<Postgres>(
            "SELECT id, user_id, quiz_id, condition, started_at, completed_at, \
             theta, theta_sd, kc_states FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else { return Ok(None) };
        let session = row_to_session(&row)?;

        let interaction_rows = sqlx::query::<Postgres>(
            "SELECT id, session_id, question_id, selected_answer, is_correct, \
             response_time_ms, theta_before, theta_after, p_learned_before, \
             p_learned_after, created_at FROM interactions \
             WHERE session_id = $1 ORDER BY created_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        let interactions = interaction_rows
            .iter()
            .map(row_to_interaction)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some((session, interactions)))
    }

    async fn create_session(&self, initial: NewSession) -> Result<Session> {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let kc_states_json = serde_json::to_value(&initial.kc_states)
            .map_err(|e| RepositoryError::Internal(e.to_string()))?;

        sqlx::query::<Postgres>(
            "INSERT INTO sessions (id, user_id, quiz_id, condition, started_at, \
             completed_at, theta, theta_sd, kc_states, version) \
             VALUES ($1, $2, $3, $4, $5, NULL, $6, $7, $8, 0)",
        )
        .bind(id)
        .bind(initial.user_id)
        .bind(initial.quiz_id)
        .bind(initial.condition.to_string())
        .bind(started_at)
        .bind(initial.theta)
        .bind(initial.theta_sd)
        .bind(&kc_states_json)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Session {
            id,
            user_id: initial.user_id,
            quiz_id: initial.quiz_id,
            condition: initial.condition,
            started_at,
            completed_at: None,
            theta: initial.theta,
            theta_sd: initial.theta_sd,
            kc_states: initial.kc_states,
        })
    }

    async fn record_answer_atomically(
        &self,
        session_id: Uuid,
        interaction: InteractionDraft,
        session_update: SessionUpdate,
    ) -> Result<Interaction> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let locked = sqlx::query::<Postgres>(
            "SELECT completed_at FROM sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| RepositoryError::NotFound(format!("session {session_id}")))?;

        let completed_at: Option<DateTime<Utc>> = locked.get("completed_at");
        if completed_at.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "session {session_id} is already completed"
            )));
        }

        let duplicate = sqlx::query::<Postgres>(
            "SELECT 1 FROM interactions WHERE session_id = $1 AND question_id = $2",
        )
        .bind(session_id)
        .bind(interaction.question_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        if duplicate.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "question {} already answered in session {session_id}",
                interaction.question_id
            )));
        }

        let interaction_id = Uuid::new_v4();
        let created_at = Utc::now();

        sqlx::query::<Postgres>(
            "INSERT INTO interactions (id, session_id, question_id, selected_answer, \
             is_correct, response_time_ms, theta_before, theta_after, \
             p_learned_before, p_learned_after, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(interaction_id)
        .bind(session_id)
        .bind(interaction.question_id)
        .bind(interaction.selected_answer.to_string())
        .bind(interaction.is_correct)
        .bind(interaction.response_time_ms as i64)
        .bind(interaction.theta_before)
        .bind(interaction.theta_after)
        .bind(interaction.p_learned_before)
        .bind(interaction.p_learned_after)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let kc_states_json = serde_json::to_value(&session_update.kc_states)
            .map_err(|e| RepositoryError::Internal(e.to_string()))?;

        sqlx::query::<Postgres>(
            "UPDATE sessions SET theta = $2, theta_sd = $3, kc_states = $4, \
             version = version + 1 WHERE id = $1",
        )
        .bind(session_id)
        .bind(session_update.theta)
        .bind(session_update.theta_sd)
        .bind(&kc_states_json)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(Interaction {
            id: interaction_id,
            session_id,
            question_id: interaction.question_id,
            selected_answer: interaction.selected_answer,
            is_correct: interaction.is_correct,
            response_time_ms: interaction.response_time_ms,
            theta_before: interaction.theta_before,
            theta_after: interaction.theta_after,
            p_learned_before: interaction.p_learned_before,
            p_learned_after: interaction.p_learned_after,
            created_at,
        })
    }

    async fn complete_session(&self, session_id: Uuid, completed_at: DateTime<Utc>) -> Result<Session> {
        let row = sqlx::query::<Postgres>(
            "UPDATE sessions SET completed_at = $2 WHERE id = $1 AND completed_at IS NULL \
             RETURNING id, user_id, quiz_id, condition, started_at, completed_at, \
             theta, theta_sd, kc_states",
        )
        .bind(session_id)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| {
            RepositoryError::Conflict(format!("session {session_id} is already completed"))
        })?;

        row_to_session(&row)
    }
}
