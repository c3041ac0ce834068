use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sagepay_server::api::{self, keys::InMemorySecurityKeyStore, AppState};
use sagepay_server::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting gateway registration and notification service");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Gateway mode: {}", config.gateway.mode);
    tracing::info!("Vendor: {}", config.gateway.vendor);

    let manager = config.build_manager()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST and PORT must form a valid socket address")?;

    let state = AppState {
        config: Arc::new(config),
        manager: Arc::new(manager),
        keys: Arc::new(InMemorySecurityKeyStore::new()),
    };

    let app = api::router(state).layer(TraceLayer::new_for_http());

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
