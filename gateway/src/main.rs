use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ops_core::{Dispatcher, Settings};
use ops_gateway::{build_app, AppState, OPS_ROUTE};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("Ops Copilot Gateway Initializing...");

    // 2. Configuration
    let settings = Settings::from_env().context("Failed to load settings")?;

    // 3. Dispatcher (Resource Graph client behind the ambient credential chain)
    let dispatcher = Dispatcher::from_settings(&settings);
    let app = build_app(AppState::new(dispatcher));

    // 4. Start Server
    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!("Gateway listening on {} (route {})", settings.bind, OPS_ROUTE);

    axum::serve(listener, app).await?;
    Ok(())
}
