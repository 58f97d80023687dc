//! Development peer binary.
//!
//! Stands in for the GIS application during client development: it serves
//! the wire protocol with a stub command registry so a client can exercise
//! connect, dispatch, and error paths without a real application running.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use serde_json::{Map, Value, json};
use signal_hook::consts::{SIGINT, SIGTERM};
use thiserror::Error;
use tracing::info;

use mapbridge_config::{Config, Endpoint, LogFormat};
use mapbridged::{
    DispatchConnectionHandler, HandlerRegistry, Reply, SocketListener, telemetry,
};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(name = "mapbridged", about = "Stub peer for the MapBridge protocol")]
struct Cli {
    /// Socket endpoint to listen on (tcp://host:port).
    #[arg(long)]
    endpoint: Option<Endpoint>,
    /// Log filter expression (e.g. "info" or "mapbridged::dispatch=debug").
    #[arg(long)]
    log_filter: Option<String>,
    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] mapbridge_config::ConfigError),
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error("failed to start listener: {0}")]
    Listener(#[from] mapbridged::ListenerError),
    #[error("failed to register shutdown signal handler: {0}")]
    Signals(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be up yet, so report on stderr directly.
            eprintln!("mapbridged: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RunError> {
    let config = load_config(cli)?;
    telemetry::initialise(&config)?;

    let registry = Arc::new(stub_registry());
    let handler = Arc::new(DispatchConnectionHandler::new(Arc::clone(&registry)));

    let listener = SocketListener::bind(config.endpoint())?;
    info!(endpoint = %config.endpoint(), commands = registry.len(), "peer starting");
    let handle = listener.start(handler)?;

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&stop))?;
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(SHUTDOWN_POLL);
    }

    info!("shutdown signal received");
    handle.shutdown();
    handle.join()?;
    Ok(())
}

fn load_config(cli: Cli) -> Result<Config, RunError> {
    let mut config = Config::load()?;
    if let Some(endpoint) = cli.endpoint {
        config.set_endpoint(endpoint);
    }
    if let Some(filter) = cli.log_filter {
        config.set_log_filter(filter);
    }
    if let Some(format) = cli.log_format {
        config.set_log_format(format);
    }
    Ok(config)
}

/// Stub handlers mirroring the application's most basic commands.
fn stub_registry() -> HandlerRegistry {
    use mapbridge_proto::commands;

    let mut registry = HandlerRegistry::new();
    // Liveness probe keeps the legacy bare shape.
    registry.register(commands::PING, |_: &Map<String, Value>| {
        Ok(Reply::bare(json!({ "pong": true })))
    });
    registry.register(commands::GET_APP_INFO, |_: &Map<String, Value>| {
        Ok(Reply::value(json!({
            "name": "mapbridged",
            "version": env!("CARGO_PKG_VERSION"),
            "stub": true,
        })))
    });
    registry
}
