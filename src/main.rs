//! hostchecker
//!
//! Prometheus exporter that checks HTTP(S) endpoints on every scrape.
//!
//! ```text
//! ┌────────────┐  scrape   ┌──────────────┐  bounded fan-out  ┌──────────┐
//! │ Prometheus │──────────▶│ SiteExporter │──────────────────▶│ Checkers │
//! └────────────┘           └──────────────┘                   └──────────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use prometheus::Registry;
use tracing::{error, info, Level};
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use hostchecker::error::Result;
use hostchecker::exporter::run_metrics_server;
use hostchecker::{Config, SiteCollector, SiteExporter};

// =============================================================================
// CLI Arguments
// =============================================================================

/// hostchecker - expose HTTP(S) site availability as Prometheus metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(
        short,
        long,
        env = "HOSTCHECKER_CONFIG",
        default_value = "/etc/hostchecker/config.yaml"
    )]
    config: String,

    /// Log debug messages
    #[arg(short, long)]
    debug: bool,

    /// Listener port (overrides config file)
    #[arg(long, env = "HOSTCHECKER_PORT")]
    port: Option<u16>,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&args, false);
            error!("failed to load configuration: {}", e);
            return Err(e);
        }
    };

    init_logging(&args, config.debug);

    let port = args.port.unwrap_or(config.port);
    info!("Starting hostchecker");
    info!("  Config: {}", args.config);
    info!("  Targets: {}", config.targets.http.len());
    info!("  Max concurrent checks: {}", config.max_concurrent_checks);
    info!("  Request timeout: {:?}", config.timeout());

    let collector = Arc::new(SiteCollector::from_config(&config)?);
    let registry = Registry::new();
    registry.register(Box::new(SiteExporter::new(collector)?))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tokio::select! {
        result = run_metrics_server(addr, registry) => {
            if let Err(ref e) = result {
                error!("Metrics server error: {}", e);
            }
            result?;
        }
        _ = shutdown_signal() => {}
    }

    info!("hostchecker shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args, config_debug: bool) {
    let level = if args.debug || config_debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Shutdown
// =============================================================================

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
