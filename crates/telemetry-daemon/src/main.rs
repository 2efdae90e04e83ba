//! ECU Telemetry - Main Entry Point

use anyhow::Result;
use telemetry_daemon::{init_logging, load_config, run};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref())?;
    init_logging(&config.log_file, &config.log_level)?;

    info!("=== ECU Telemetry v{} ===", env!("CARGO_PKG_VERSION"));
    run(config).await
}
