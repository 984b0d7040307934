//! Candlestore Server - Main entry point

use anyhow::Result;
use candlestore_common::logging::{init_logging, LogConfig};
use tracing::info;

use candlestore_server::{api, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("candlestore-server")
        .filter_directives("candlestore_server=debug,tower_http=debug,sqlx=warn")
        .build();

    // Environment variables take precedence over the defaults above
    let log_config = LogConfig::from_env_with(log_config)?;

    init_logging(&log_config)?;

    info!("Starting Candlestore Server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        size_unit_bytes = config.ingest.size_unit_bytes,
        batch_size = config.ingest.batch_size,
        "Configuration loaded"
    );

    api::serve(config).await
}
