//! OpenAPI specification generated via `utoipa`.

use utoipa::OpenApi;

use crate::api::routes::{health, sessions};

/// OpenAPI 3.1 document for the Noesis adaptive assessment kernel.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Noesis Adaptive Assessment Kernel API",
        version = "1.0.0",
        description = "HTTP transport over the IRT/BKT adaptive assessment kernel.",
        contact(
            name = "Noesis Kernel Contributors",
            email = "kernel@noesis.dev"
        )
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::liveness_check,
        sessions::create_session,
        sessions::next_question,
        sessions::submit_answer,
        sessions::session_summary,
    ),
    components(
        schemas(
            health::HealthResponse,
            sessions::CreateSessionRequest,
            sessions::CreateSessionResponse,
            sessions::QuestionOptions,
            sessions::NextQuestionMeta,
            sessions::NextQuestionResponse,
            sessions::SessionCompleteResponse,
            sessions::NextStepResponse,
            sessions::SubmitAnswerRequest,
            sessions::ThetaSummaryResponse,
            sessions::BktSummaryResponse,
            sessions::SubmitAnswerResponse,
            sessions::KcStateResponse,
            sessions::SessionSummaryResponse,
        )
    ),
    tags(
        (name = "health", description = "Health, readiness, and liveness probes"),
        (name = "sessions", description = "Adaptive assessment session lifecycle"),
    )
)]
pub struct ApiDoc;
