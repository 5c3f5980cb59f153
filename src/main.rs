use anyhow::Result;
use gabaylakbay_translator::{config, server};
use std::time::Duration;
use tracing::{error, info, warn};

/// How long shutdown waits for background translations still in flight.
const FANOUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gabaylakbay_translator=info".parse()?),
        )
        .init();

    info!("Starting GabayLakbay translation service");

    // Load configuration from environment
    let config = config::Config::from_env()?;

    let (state, dispatcher) = server::AppState::from_config(&config).await?;
    server::serve(&config, state).await?;
    info!("Server stopped, waiting for background translations");

    // The router owned the last queue handle, so the dispatcher now drains
    match tokio::time::timeout(FANOUT_DRAIN_TIMEOUT, dispatcher).await {
        Ok(Ok(())) => info!("✓ Background translations finished"),
        Ok(Err(e)) => error!("Fan-out dispatcher failed: {}", e),
        Err(_) => warn!(
            "Background translations still running after {:?}, abandoning them",
            FANOUT_DRAIN_TIMEOUT
        ),
    }

    Ok(())
}
