//! Polarity Server - Main entry point.

use anyhow::Result;
use polarity_common::config::Config;
use polarity_common::logging::init_logging_with_exclusions;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (.env, config file, then environment overrides)
    let config = Config::load_and_validate()?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Polarity Server v{}", env!("CARGO_PKG_VERSION"));

    // A missing backend credential is fatal here, before the listener binds
    if let Err(e) = polarity_server::start_server(&config).await {
        tracing::error!(error = %e, "Server stopped");
        return Err(e);
    }

    Ok(())
}
