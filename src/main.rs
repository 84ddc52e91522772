//! Modular TCP Server
//!
//! A TCP server whose behavior lives in pluggable modules. The core owns
//! sockets and ordering; modules own semantics.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────────┐
//!                        │                  MODULAR SERVER                   │
//!                        │                                                   │
//!     Client Connection  │  ┌──────────┐    ┌───────────────────────────┐   │
//!     ───────────────────┼─▶│   net    │───▶│ server: handler chain     │   │
//!                        │  │ listener │    │ (connection modules, in   │   │
//!                        │  └──────────┘    │  priority order)          │   │
//!                        │                  └────────────┬──────────────┘   │
//!                        │                               │ buffered bytes   │
//!                        │                               ▼                  │
//!     Client Reply       │  ┌──────────┐    ┌───────────────────────────┐   │
//!     ◀──────────────────┼──│  reply   │◀───│ execution line            │   │
//!                        │  │  write   │    │ (pipeline modules, in     │   │
//!                        │  └──────────┘    │  priority order)          │   │
//!                        │                  └───────────────────────────┘   │
//!                        │                                                   │
//!                        │  ┌─────────────────────────────────────────────┐  │
//!                        │  │           Cross-Cutting Concerns            │  │
//!                        │  │  ┌────────┐ ┌─────────────┐ ┌────────────┐  │  │
//!                        │  │  │ config │ │ module host │ │ observa-   │  │  │
//!                        │  │  │ +reload│ │ (lifecycle) │ │ bility     │  │  │
//!                        │  │  └────────┘ └─────────────┘ └────────────┘  │  │
//!                        │  └─────────────────────────────────────────────┘  │
//!                        └───────────────────────────────────────────────────┘
//! ```
//!
//! # Runtime Shape
//!
//! - TCP listener with connection limits
//! - Module lifecycle (init/hook/unhook/destroy) driven by the host
//! - Priority-ordered dispatch on both module surfaces
//! - Config reload with module reconcile (file watch and SIGHUP)
//! - Graceful shutdown: stop accepting, drain, tear down modules

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use modular_server::builtin;
use modular_server::config::{load_config, ConfigWatcher, ServerConfig};
use modular_server::host::ModuleHost;
use modular_server::lifecycle::{handle_signals, Shutdown};
use modular_server::net::Listener;
use modular_server::observability::{init_logging, init_metrics};
use modular_server::pipeline::ExecutionLine;
use modular_server::server::Server;

#[derive(Parser)]
#[command(name = "modular-server")]
#[command(about = "TCP server built around a pluggable module pipeline", long_about = None)]
struct Cli {
    /// Path to the TOML config file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Log format override (pretty or json).
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    // CLI flags win over the config file for logging.
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.observability.log_format = format.clone();
    }

    init_logging(&config.observability);

    tracing::info!("modular-server v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        modules = config.modules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Core wiring: the line, the server dispatching into it, the host that
    // loads modules onto both.
    let line = Arc::new(ExecutionLine::new());
    let config = Arc::new(config);
    let server = Arc::new(Server::new(Arc::clone(&line), Arc::clone(&config)));
    let host = Arc::new(ModuleHost::new(line, Arc::clone(&server)));
    let catalog = builtin::catalog();

    host.reconcile(&catalog, &config.modules);
    for info in host.describe() {
        tracing::info!(
            module = %info.name,
            kind = %info.kind,
            version = %info.version,
            priority = info.priority,
            "Module active"
        );
    }

    let listener = Listener::bind(&config.listener).await?;
    tracing::info!(address = %listener.local_addr(), "Listening for connections");

    let shutdown = Shutdown::new();
    let accept_rx = shutdown.subscribe();

    let (reload_tx, mut reload_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(handle_signals(shutdown.clone(), reload_tx));

    // Config reload: file watcher events and SIGHUP both land here. The
    // watcher handle must stay alive or watching stops.
    let _watcher = if let Some(path) = cli.config.clone() {
        let (watcher, mut file_rx) = ConfigWatcher::new(&path);
        match watcher.run() {
            Ok(handle) => {
                let host = Arc::clone(&host);
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    loop {
                        let next = tokio::select! {
                            Some(config) = file_rx.recv() => Some(config),
                            Some(()) = reload_rx.recv() => match load_config(&path) {
                                Ok(config) => Some(config),
                                Err(error) => {
                                    tracing::error!(error = %error, "Reload failed, keeping current config");
                                    None
                                }
                            },
                            else => break,
                        };
                        if let Some(config) = next {
                            let config = Arc::new(config);
                            server.update_config(Arc::clone(&config));
                            host.reconcile(&catalog, &config.modules);
                        }
                    }
                });
                Some(handle)
            }
            Err(error) => {
                tracing::warn!(error = %error, "Config watcher failed to start; live reload disabled");
                None
            }
        }
    } else {
        tokio::spawn(async move {
            while reload_rx.recv().await.is_some() {
                tracing::warn!("Reload requested but no config file was given");
            }
        });
        None
    };

    Arc::clone(&server).run(listener, accept_rx).await;

    // Accept loop stopped. Drain the workers, then tear down modules; the
    // unhooks wait out any chain still holding a dispatch lock.
    let drain = Duration::from_secs(server.config().timeouts.drain_secs);
    if server.tracker().drain(drain).await {
        tracing::info!("All connections drained");
    } else {
        tracing::warn!(
            active = server.tracker().active(),
            "Drain deadline hit with connections still open"
        );
    }
    host.shutdown();

    tracing::info!("Shutdown complete");
    Ok(())
}
