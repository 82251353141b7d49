//! Registers every HTTP route module.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod sessions;

/// Health-check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().merge(health::router())
}

/// Session lifecycle routes.
pub fn session_routes() -> Router<AppState> {
    Router::new().merge(sessions::router())
}
