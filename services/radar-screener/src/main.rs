//! Breakout Radar - scheduled breakout screener for NSE/BSE equities.
//!
//! Fetches rate-limited price history, computes technical indicators,
//! classifies breakouts and maintains a deduplicated radar.

use anyhow::Result;
use radar_common::config::Config;
use radar_common::logging::init_logging_with_exclusions;
use radar_screener::RadarService;

#[tokio::main]
async fn main() -> Result<()> {
    // Start timing immediately for cold-start measurement
    let startup_start = std::time::Instant::now();

    // Load configuration (file, then env overrides) and validate it
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Breakout Radar v{}", env!("CARGO_PKG_VERSION"));

    let service = RadarService::new(config).await?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    service.start().await
}
