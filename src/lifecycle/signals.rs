//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//! - Trigger appropriate actions (shutdown, reload)
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A second SIGTERM/SIGINT forces immediate exit
//! - SIGHUP triggers config reload, not shutdown

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

use super::shutdown::Shutdown;

/// Listen for OS signals until the process exits.
///
/// The first SIGINT or SIGTERM triggers graceful shutdown. A second one
/// aborts the process, so a stuck drain never leaves the server
/// unkillable. SIGHUP requests a config reload over `reload`.
pub async fn handle_signals(shutdown: Shutdown, reload: mpsc::UnboundedSender<()>) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(error = %error, "Failed to register SIGTERM handler");
            return;
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(error = %error, "Failed to register SIGHUP handler");
            return;
        }
    };

    let mut stopping = false;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    tracing::error!(error = %error, "Failed to listen for SIGINT");
                    return;
                }
                stop(&shutdown, &mut stopping, "SIGINT");
            }
            _ = sigterm.recv() => {
                stop(&shutdown, &mut stopping, "SIGTERM");
            }
            _ = sighup.recv() => {
                tracing::info!("Config reload requested (SIGHUP)");
                let _ = reload.send(());
            }
        }
    }
}

fn stop(shutdown: &Shutdown, stopping: &mut bool, signal_name: &str) {
    if *stopping {
        tracing::warn!(signal = signal_name, "Second stop signal, exiting immediately");
        std::process::exit(1);
    }
    *stopping = true;
    tracing::info!(signal = signal_name, "Shutdown requested");
    shutdown.trigger();
}
