//! Entrypoint for the adaptive assessment kernel's HTTP server.
//!
//! Initialises telemetry, loads configuration, and serves the Axum router
//! exposing the session lifecycle endpoints behind rate limiting,
//! compression, CORS, and OpenAPI docs.

use std::net::SocketAddr;

use noesis_server::{config::Config, state::AppState};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("initializing noesis adaptive assessment kernel server");

    let config = Config::from_env()?;
    let state = AppState::new(&config).await?;

    let host = std::env::var("HOST").unwrap_or_else(|_| config.host().to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or_else(|| config.port());
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    let app = noesis_server::build_router(state, config.rate_limit_requests_per_minute());

    let listener = TcpListener::bind(addr).await?;
    info!("starting noesis server on {}", host_port(&listener)?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("noesis_server=info,noesis_engine=info,tower_http=info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_level(true);

    let registry = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(registry)
        .expect("failed to initialize tracing subscriber");
}

fn host_port(listener: &TcpListener) -> anyhow::Result<String> {
    Ok(listener.local_addr()?.to_string())
}
