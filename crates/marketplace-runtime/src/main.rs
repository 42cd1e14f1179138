//! Marketplace node entry point.

use anyhow::{Context, Result};
use marketplace_runtime::{MarketRuntime, RuntimeConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RuntimeConfig::from_env().context("loading configuration")?;
    let mut runtime = MarketRuntime::new(config);
    runtime.start();
    info!("marketplace node running, press ctrl-c to stop");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    runtime.shutdown().await;
    Ok(())
}
