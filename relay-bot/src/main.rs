//! deepseek-relay - Main entry point.

use anyhow::{Context, Result};
use relay_bot::start;
use relay_common::config::Config;
use relay_common::logging::init_logging;
use relay_llm::HistoryStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; missing secrets abort here
    let config = Config::load_with_env().context("failed to load configuration")?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("deepseek-relay v{}", env!("CARGO_PKG_VERSION"));

    let mut store = HistoryStore::from_config(&config.session);
    tracing::info!(
        max_stored = store.max_stored(),
        context_turns = store.context_turns(),
        "History store ready"
    );
    start(&config, &mut store).await
}
