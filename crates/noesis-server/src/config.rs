//! Configuration loading for the kernel's HTTP transport.

use anyhow::{Context, Result};
use config::{Environment, File};
use noesis_engine::SessionCompletionMode;

/// Complete configuration for the HTTP server.
#[derive(Clone, Debug)]
pub struct Config {
    host: String,
    port: u16,
    database_url: String,
    rate_limit_requests_per_minute: u32,
    session_completion_mode: SessionCompletionMode,
}

impl Config {
    /// Loads configuration from environment variables (`.env` included).
    pub fn from_env() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(Environment::default().separator("__").try_parsing(true));

        if let Ok(config_path) = std::env::var("NOESIS_CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_path));
        }

        let settings = builder.build().context("failed to build configuration")?;

        let host = settings
            .get_string("HOST")
            .unwrap_or_else(|_| default_host().to_string());

        let port = settings
            .get_int("PORT")
            .map(|value| value as u16)
            .unwrap_or_else(|_| default_port());

        let database_url = settings
            .get_string("DATABASE_URL")
            .context("set DATABASE_URL to a PostgreSQL connection string")?;

        let rate_limit_requests_per_minute = settings
            .get_int("RATE_LIMIT_REQUESTS_PER_MINUTE")
            .map(|value| value.max(1) as u32)
            .unwrap_or_else(|_| default_rate_limit_requests());

        let session_completion_mode = settings
            .get_string("SESSION_COMPLETION_MODE")
            .ok()
            .map(|raw| parse_completion_mode(&raw))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            database_url,
            rate_limit_requests_per_minute,
            session_completion_mode,
        })
    }

    /// Binding host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Binding TCP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// PostgreSQL connection string.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Maximum requests per client IP per minute.
    pub fn rate_limit_requests_per_minute(&self) -> u32 {
        self.rate_limit_requests_per_minute
    }

    /// Session completion policy: item exhaustion (default) or
    /// all-KCs-mastered early exit.
    pub fn session_completion_mode(&self) -> SessionCompletionMode {
        self.session_completion_mode
    }
}

fn parse_completion_mode(raw: &str) -> Result<SessionCompletionMode> {
    match raw {
        "item-exhaustion" => Ok(SessionCompletionMode::ItemExhaustion),
        "all-kcs-mastered" => Ok(SessionCompletionMode::AllKcsMastered),
        other => Err(anyhow::anyhow!(
            "SESSION_COMPLETION_MODE must be 'item-exhaustion' or 'all-kcs-mastered' (got {other})"
        )),
    }
}

const fn default_port() -> u16 {
    8080
}

fn default_host() -> &'static str {
    "0.0.0.0"
}

const fn default_rate_limit_requests() -> u32 {
    120
}
