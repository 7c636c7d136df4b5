//! Eureka! Clinical proxy.
//!
//! ```text
//!   browser ──▶ http (session cookie, header filter) ──▶ routing ──▶ client ──▶ backend
//!                          │                                           │
//!                          ▼                                           ▼
//!                  session registry                         CAS /proxy (tickets)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use eureka_proxy::config::{load_config, ProxyConfig};
use eureka_proxy::lifecycle::{trigger_on_signal, Shutdown};
use eureka_proxy::observability::{init_logging, metrics};
use eureka_proxy::routing::{ConfigRouteTable, RouteTable};
use eureka_proxy::session::{Anonymous, CasHeaderPrincipalResolver, PrincipalResolver};
use eureka_proxy::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "eureka-proxy", version, about = "Per-user proxy to Eureka! Clinical services")]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "EUREKA_PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("eureka-proxy: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("eureka-proxy: {e}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "eureka-proxy starting");

    let routes = ConfigRouteTable::new(&config).load()?;
    tracing::info!(
        routes = routes.len(),
        backends = config.backends.len(),
        cas = config.cas.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let resolver: Arc<dyn PrincipalResolver> = if config.cas.enabled {
        Arc::new(CasHeaderPrincipalResolver::from_config(&config.cas)?)
    } else {
        Arc::new(Anonymous)
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    trigger_on_signal(shutdown.clone());

    HttpServer::new(config, routes, resolver)
        .run(listener, shutdown)
        .await?;
    Ok(())
}
