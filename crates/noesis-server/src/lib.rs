//! HTTP transport for the adaptive assessment kernel: route construction
//! is exposed as a library so integration tests can exercise the full
//! Axum stack against an in-memory repository, without a live Postgres.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod state;

use std::num::NonZeroU32;
use std::time::Duration;

use axum::Router;
use middleware::rate_limit::RateLimitLayer;
use state::AppState;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// Builds the full application router: session/health routes, Swagger UI,
/// and the ambient layer stack (tracing, compression, CORS, rate limiting).
pub fn build_router(state: AppState, rate_limit_requests_per_minute: u32) -> Router {
    let openapi = api::openapi::ApiDoc::openapi();
    let rate_limit = NonZeroU32::new(rate_limit_requests_per_minute.max(1))
        .expect("rate limit requests must be greater than zero");

    Router::new()
        .merge(api::routes::health_routes())
        .merge(api::routes::session_routes())
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RateLimitLayer::new(rate_limit, Duration::from_secs(60)))
        .with_state(state)
}
