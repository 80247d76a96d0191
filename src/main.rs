//! Route dispatch server.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                  ROUTE DISPATCH                       │
//!   HTTP request  │  ┌─────────┐    ┌────────────┐    ┌──────────────┐   │
//!   ──────────────┼─▶│  http   │───▶│  root      │───▶│ nested       │   │
//!                 │  │ server  │    │  Router    │    │ Routers ...  │   │
//!                 │  └─────────┘    └─────┬──────┘    └──────┬───────┘   │
//!                 │                       ▼                  ▼           │
//!   HTTP response │  ┌─────────┐    ┌────────────┐    ┌──────────────┐   │
//!   ◀─────────────┼──│response │◀───│ handlers   │───▶│ ClientRouter │───┼──▶ upstream
//!                 │  │ mapping │    │ echo/static│    │ http / file  │   │
//!                 │  └─────────┘    │ redirect   │    └──────────────┘   │
//!                 │                 └────────────┘                       │
//!                 │   config (+ hot reload) · lifecycle · observability   │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use route_dispatch::config::{load_config, AppConfig, ConfigWatcher};
use route_dispatch::lifecycle::signals::shutdown_signal;
use route_dispatch::lifecycle::startup::apply_reloads;
use route_dispatch::observability::{logging, metrics};
use route_dispatch::{Dispatcher, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "Scored request router with hot-reloadable routes", long_about = None)]
struct Cli {
    /// TOML configuration file. Without one, an empty router answers 404.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Disable config file watching.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!("route-dispatch v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let dispatcher = Arc::new(Dispatcher::build(&config)?);

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match (&cli.config, cli.no_watch) {
        (Some(path), false) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            tokio::spawn(apply_reloads(dispatcher.clone(), updates));
            Some(watcher)
        }
        _ => None,
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(&config.server, dispatcher.clone());
    let drained = shutdown.wait();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.trigger();
    });

    server.run(listener, drained).await?;
    dispatcher.stop();

    tracing::info!("Shutdown complete");
    Ok(())
}
