//! Just Weather - JSON API for current weather, city search and electricity prices
//!
//! Upstream data is fetched through a synchronous bridge over a cooperative
//! tokio runtime and cached on disk per upstream.

use std::sync::Arc;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use just_weather::bridge::{ReqwestHttpClient, RuntimeScheduler, SyncFetchBridge};
use just_weather::cli::{Cli, ServerConfig};
use just_weather::routes::Services;
use just_weather::server;

/// How long in-flight requests may keep running after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match ServerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    init_tracing();
    tracing::info!(
        cache_dir = %config.cache_dir.display(),
        cache_enabled = config.cache_enabled,
        timeout_secs = config.timeout.as_secs(),
        "starting just-weather"
    );

    // The bridge runtime is only ever driven from blocking handler threads
    let scheduler = Arc::new(RuntimeScheduler::new()?);
    let client = Arc::new(ReqwestHttpClient::new(scheduler.handle())?);
    let bridge = Arc::new(
        SyncFetchBridge::new(client, scheduler)
            .with_timeout(config.timeout)
            .with_monotonic_clock(),
    );
    let services = Arc::new(Services::from_config(&config, bridge));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(server::serve(
        config.bind,
        Arc::clone(&services),
        server::shutdown_signal(),
    ));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    // Dropped outside of any runtime: it owns the bridge runtime
    drop(services);

    result?;
    tracing::info!("stopped");
    Ok(())
}
