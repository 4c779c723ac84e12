//! Phishing Risk Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use std::net::SocketAddr;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use phish_risk_analyzer::api::{create_router, AppState};
use phish_risk_analyzer::metrics::Metrics;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("phish_risk_analyzer=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Read-only singletons: analyst, classifier, brand matcher, probes.
    let state = AppState::from_env().await;

    let metrics = Metrics::init();
    let app = create_router(state).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "phish-risk-analyzer listening");
    axum::serve(listener, app).await?;
    Ok(())
}
