use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use stan_backend::config::BotConfig;
use stan_backend::runtime::BackendRuntime;
use stan_backend::server::serve;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stan=debug,stan_backend=debug")),
        )
        .init();

    tracing::info!("Stan starting...");
    if let Err(error) = dotenv {
        if !error.not_found() {
            tracing::warn!("Failed to read .env: {}", error);
        }
    }

    let config = BotConfig::load();
    let runtime = BackendRuntime::bootstrap(config).context("failed to bootstrap backend runtime")?;

    serve(runtime).await
}
