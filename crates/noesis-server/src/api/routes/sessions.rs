//! Session lifecycle endpoints: create a session, serve the next
//! question, submit an answer, and summarise per-KC mastery.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use noesis_engine::{AnswerRecorded, NextQuestion, NextStep, SessionComplete, SessionCreated};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

fn default_condition() -> String {
    "adaptive".to_string()
}

/// Payload for `POST /sessions`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    #[serde(default = "default_condition")]
    #[schema(example = "adaptive")]
    pub condition: String,
}

/// Response to a successful `POST /sessions`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    #[schema(example = "adaptive")]
    pub condition: String,
    #[schema(example = -0.780)]
    pub theta: f64,
    #[schema(example = 0.543)]
    pub theta_sd: f64,
    pub message: String,
}

impl From<SessionCreated> for CreateSessionResponse {
    fn from(created: SessionCreated) -> Self {
        Self {
            session_id: created.session_id,
            condition: created.condition.to_string(),
            theta: created.theta,
            theta_sd: created.theta_sd,
            message: created.message,
        }
    }
}

/// The four labelled answer options, A through D.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}

impl From<Vec<(noesis_repository::AnswerLabel, String)>> for QuestionOptions {
    fn from(options: Vec<(noesis_repository::AnswerLabel, String)>) -> Self {
        use noesis_repository::AnswerLabel::*;
        let mut a = String::new();
        let mut b = String::new();
        let mut c = String::new();
        let mut d = String::new();
        for (label, text) in options {
            match label {
                A => a = text,
                B => b = text,
                C => c = text,
                D => d = text,
            }
        }
        Self { a, b, c, d }
    }
}

/// Meta envelope accompanying a served question.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionMeta {
    pub current_theta: f64,
    pub item_difficulty: f64,
    pub item_information: f64,
    pub questions_answered: usize,
    pub questions_remaining: usize,
    #[schema(example = "adaptive")]
    pub condition: String,
}

/// A question stripped of its correct answer, ready to serve.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionResponse {
    pub question_id: Uuid,
    pub text: String,
    pub options: QuestionOptions,
    pub bloom: u8,
    pub kc: String,
    pub meta: NextQuestionMeta,
}

impl From<NextQuestion> for NextQuestionResponse {
    fn from(q: NextQuestion) -> Self {
        Self {
            question_id: q.question_id,
            text: q.text,
            options: q.options.into(),
            bloom: q.bloom,
            kc: q.kc,
            meta: NextQuestionMeta {
                current_theta: q.meta.current_theta,
                item_difficulty: q.meta.item_difficulty,
                item_information: q.meta.item_information,
                questions_answered: q.meta.questions_answered,
                questions_remaining: q.meta.questions_remaining,
                condition: q.meta.condition.to_string(),
            },
        }
    }
}

/// Returned once every quiz question has an interaction.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompleteResponse {
    pub completed: bool,
    pub final_theta: f64,
    pub total_answered: usize,
}

impl From<SessionComplete> for SessionCompleteResponse {
    fn from(complete: SessionComplete) -> Self {
        Self {
            completed: complete.completed,
            final_theta: complete.final_theta,
            total_answered: complete.total_answered,
        }
    }
}

/// Either a question to serve, or the session-complete payload. Mirrors
/// `NextStep`'s untagged shape from `noesis-engine`; never includes the
/// correct answer.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum NextStepResponse {
    Question(NextQuestionResponse),
    Complete(SessionCompleteResponse),
}

impl From<NextStep> for NextStepResponse {
    fn from(step: NextStep) -> Self {
        match step {
            NextStep::Question(q) => NextStepResponse::Question(q.into()),
            NextStep::Complete(c) => NextStepResponse::Complete(c.into()),
        }
    }
}

/// Payload for `POST /sessions/{id}/answer`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: Uuid,
    #[schema(example = "A")]
    pub selected_answer: String,
    #[serde(default)]
    #[schema(example = 1500)]
    pub response_time_ms: u64,
}

/// Ability-estimate summary returned from `submitAnswer`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ThetaSummaryResponse {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub sd: f64,
    pub ci95: [f64; 2],
}

/// BKT update summary for the one KC touched by the response.
#[derive(Debug, Serialize, ToSchema)]
pub struct BktSummaryResponse {
    pub kc: String,
    #[serde(rename = "pLearned_before")]
    pub p_learned_before: f64,
    #[serde(rename = "pLearned_after")]
    pub p_learned_after: f64,
    #[serde(rename = "isMastered")]
    pub is_mastered: bool,
}

/// Response to a successful `POST /sessions/{id}/answer`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    #[schema(example = "A")]
    pub correct_answer: String,
    #[schema(example = "A")]
    pub selected_answer: String,
    pub theta: ThetaSummaryResponse,
    pub bkt: BktSummaryResponse,
    pub interaction_id: Uuid,
}

impl From<AnswerRecorded> for SubmitAnswerResponse {
    fn from(recorded: AnswerRecorded) -> Self {
        Self {
            correct: recorded.correct,
            correct_answer: recorded.correct_answer.to_string(),
            selected_answer: recorded.selected_answer.to_string(),
            theta: ThetaSummaryResponse {
                before: recorded.theta.before,
                after: recorded.theta.after,
                delta: recorded.theta.delta,
                sd: recorded.theta.sd,
                ci95: recorded.theta.ci95,
            },
            bkt: BktSummaryResponse {
                kc: recorded.bkt.kc,
                p_learned_before: recorded.bkt.p_learned_before,
                p_learned_after: recorded.bkt.p_learned_after,
                is_mastered: recorded.bkt.is_mastered,
            },
            interaction_id: recorded.interaction_id,
        }
    }
}

/// One KC's mastery state within a session summary.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KcStateResponse {
    pub kc_id: String,
    pub p_learned: f64,
    pub attempts: u32,
    pub correct: u32,
    pub is_mastered: bool,
}

/// Session-wide KC mastery summary.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryResponse {
    pub total: usize,
    pub mastered: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub overall_progress: u32,
    pub weakest_unmastered: Option<KcStateResponse>,
    pub kc_states: Vec<KcStateResponse>,
}

/// Router for the session lifecycle endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id/next-question", get(next_question))
        .route("/sessions/:id/answer", post(submit_answer))
        .route("/sessions/:id/summary", get(session_summary))
}

/// Creates a new assessment session for a learner.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "session created", body = CreateSessionResponse),
        (status = 400, description = "validation error"),
        (status = 404, description = "user or quiz not found")
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<CreateSessionResponse>)> {
    let created = state
        .engine
        .create_session(payload.user_id, payload.quiz_id, &payload.condition)
        .await
        .map_err(ApiError::from)?;

    Ok((axum::http::StatusCode::CREATED, Json(created.into())))
}

/// Serves the next question to answer, or reports session completion.
#[utoipa::path(
    get,
    path = "/sessions/{id}/next-question",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "session id")),
    responses(
        (status = 200, description = "next question or completion payload", body = NextStepResponse),
        (status = 400, description = "session already completed"),
        (status = 404, description = "session or items missing")
    )
)]
pub async fn next_question(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NextStepResponse>> {
    let step = state.engine.select_next(id).await.map_err(ApiError::from)?;
    Ok(Json(step.into()))
}

/// Submits an answer to a served question.
#[utoipa::path(
    post,
    path = "/sessions/{id}/answer",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "session id")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "answer recorded", body = SubmitAnswerResponse),
        (status = 400, description = "validation, wrong quiz, already completed, or duplicate answer"),
        (status = 404, description = "session or question missing")
    )
)]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> ApiResult<Json<SubmitAnswerResponse>> {
    let recorded = state
        .engine
        .submit_answer(
            id,
            payload.question_id,
            &payload.selected_answer,
            payload.response_time_ms,
        )
        .await
        .map_err(ApiError::from)?;

    Ok(Json(recorded.into()))
}

/// Per-session KC mastery summary: totals, progress buckets, and the
/// weakest non-mastered KC.
#[utoipa::path(
    get,
    path = "/sessions/{id}/summary",
    tag = "sessions",
    params(("id" = Uuid, Path, description = "session id")),
    responses(
        (status = 200, description = "session KC summary", body = SessionSummaryResponse),
        (status = 404, description = "session missing")
    )
)]
pub async fn session_summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSummaryResponse>> {
    let (session, _interactions) = state
        .repo
        .get_session(id)
        .await
        .map_err(|err| ApiError::from(noesis_engine::EngineError::from(err)))?
        .ok_or_else(|| ApiError::NotFound(format!("session {id}")))?;

    let summary = noesis_bkt::summarize(&session.kc_states);
    let weakest = noesis_bkt::weakest_unmastered(&session.kc_states).map(to_kc_state_response);

    let mut kc_states: Vec<KcStateResponse> = session
        .kc_states
        .values()
        .map(to_kc_state_response)
        .collect();
    kc_states.sort_by(|a, b| a.kc_id.cmp(&b.kc_id));

    Ok(Json(SessionSummaryResponse {
        total: summary.total,
        mastered: summary.mastered,
        in_progress: summary.in_progress,
        not_started: summary.not_started,
        overall_progress: summary.overall_progress,
        weakest_unmastered: weakest,
        kc_states,
    }))
}

fn to_kc_state_response(state: &noesis_bkt::KcState) -> KcStateResponse {
    KcStateResponse {
        kc_id: state.kc_id.clone(),
        p_learned: state.p_learned,
        attempts: state.attempts,
        correct: state.correct,
        is_mastered: state.is_mastered,
    }
}
