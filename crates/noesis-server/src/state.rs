//! Shared Axum application state.

use std::sync::Arc;

use noesis_db::PgRepository;
use noesis_engine::SessionEngine;
use noesis_repository::Repository;

use crate::config::Config;

/// Immutable state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub repo: Arc<dyn Repository>,
}

impl AppState {
    /// Initialises state from loaded configuration, connecting to Postgres.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let repo: Arc<dyn Repository> = Arc::new(PgRepository::connect(config.database_url()).await?);
        Ok(Self::from_repo(repo, config.session_completion_mode()))
    }

    /// Builds state over an arbitrary repository, e.g. the in-memory
    /// implementation used by integration tests that need no live Postgres.
    pub fn from_repo(
        repo: Arc<dyn Repository>,
        completion_mode: noesis_engine::SessionCompletionMode,
    ) -> Self {
        let engine = Arc::new(SessionEngine::with_completion_mode(repo.clone(), completion_mode));
        Self { engine, repo }
    }
}
