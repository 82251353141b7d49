//! Health, readiness, and liveness probes.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::ApiError, state::AppState};

/// Consolidated health response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[schema(example = "healthy")]
    pub database: String,
}

/// Router exposing the health probes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

/// Full health check, including a database round-trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "service healthy", body = HealthResponse),
        (status = 503, description = "service degraded")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let database = match state.repo.get_kc_catalogue().await {
        Ok(_) => "healthy".to_string(),
        Err(err) => {
            tracing::warn!(error = %err, "health check database probe failed");
            "unhealthy".to_string()
        }
    };

    Ok(Json(HealthResponse {
        status: if database == "healthy" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
    }))
}

/// Readiness probe (Kubernetes).
#[utoipa::path(
    get,
    path = "/ready",
    responses((status = 200, description = "service ready"))
)]
pub async fn readiness_check() -> &'static str {
    "ready"
}

/// Liveness probe (Kubernetes).
#[utoipa::path(
    get,
    path = "/live",
    responses((status = 200, description = "service running"))
)]
pub async fn liveness_check() -> &'static str {
    "alive"
}
