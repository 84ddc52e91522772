//! Server runtime.
//!
//! # Responsibilities
//! - Expose the connection-side attachment surface to modules
//! - Accept sockets and spawn one worker task per connection
//! - Drive each connection through the handler chain, then feed what it
//!   produced through the execution line
//! - Tear every connection context down exactly once
//! - Hold the live configuration snapshot (atomic swap on reload)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::module::{ConnectionHandler, ContractViolation, Module};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerHandle};
use crate::observability::{connection_span, record_connection_closed, record_connection_opened};
use crate::pipeline::{ExecutionLine, WorkUnit};

use super::context::ConnectionContext;
use super::registry::ConnectionRegistry;

/// The hosting server.
///
/// Modules hook its connection chain through [`attach`](Self::attach) /
/// [`detach`](Self::detach); the [`run`](Self::run) loop accepts sockets
/// and drives one worker per connection. The worker owns the connection's
/// context and byte-level I/O; attached modules never touch the socket.
pub struct Server {
    registry: ConnectionRegistry,
    line: Arc<ExecutionLine>,
    tracker: ConnectionTracker,
    config: ArcSwap<ServerConfig>,
}

impl Server {
    pub fn new(line: Arc<ExecutionLine>, config: Arc<ServerConfig>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            line,
            tracker: ConnectionTracker::new(),
            config: ArcSwap::new(config),
        }
    }

    /// Attach `handler` on behalf of `module`. This is what module
    /// `hook_server` implementations call.
    pub fn attach(
        &self,
        module: Arc<dyn Module>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<(), ContractViolation> {
        self.registry.attach(module, handler)
    }

    /// Detach the named module's handler.
    pub fn detach(&self, name: &str) -> Result<(), ContractViolation> {
        self.registry.detach(name)
    }

    /// The connection-side attachment surface.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The execution line this server feeds.
    pub fn line(&self) -> &Arc<ExecutionLine> {
        &self.line
    }

    /// Connection tracker, for shutdown drain.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Snapshot of the live configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    /// Swap in a new configuration. Connections already running keep the
    /// snapshot they started with.
    pub fn update_config(&self, config: Arc<ServerConfig>) {
        self.config.store(config);
        tracing::info!("Server configuration swapped");
    }

    /// Accept loop. Returns when the shutdown signal fires; spawned
    /// connection workers keep running and are drained separately via
    /// [`tracker`](Self::tracker).
    pub async fn run(self: Arc<Self>, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        let handle = listener.handle();
        tracing::info!(address = %listener.local_addr(), "Server accepting connections");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Accept loop stopping");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            let server = Arc::clone(&self);
                            let guard = self.tracker.track();
                            let span = connection_span(guard.id(), peer);
                            tokio::spawn(
                                async move {
                                    server.drive_connection(stream, peer, handle, guard, permit).await;
                                }
                                .instrument(span),
                            );
                        }
                        Err(err) => {
                            tracing::error!(error = %err, "Accept failed");
                        }
                    }
                }
            }
        }
    }

    /// One connection, end to end: initial read, handler chain, pipeline
    /// pass, reply, close. The context lives and dies on this task.
    async fn drive_connection(
        &self,
        mut stream: TcpStream,
        peer: SocketAddr,
        handle: ListenerHandle,
        guard: ConnectionGuard,
        _permit: ConnectionPermit,
    ) {
        record_connection_opened();
        let config = self.config.load();
        let mut ctx = ConnectionContext::new(guard.id(), peer);

        // Initial read: give the chain something to work with. Reading
        // nothing is allowed; handlers that need no bytes still run.
        let read_timeout = Duration::from_secs(config.timeouts.read_secs);
        let mut buf = vec![0u8; config.listener.max_read_bytes];
        match tokio::time::timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) => ctx.buffer_mut().extend_from_slice(&buf[..n]),
            Ok(Err(err)) => {
                tracing::debug!(connection_id = %ctx.id(), error = %err, "Initial read failed");
            }
            Err(_) => {
                tracing::debug!(connection_id = %ctx.id(), "Initial read timed out");
            }
        }

        if self.registry.dispatch(&handle, &mut ctx).is_err() {
            // Chain aborted: close without replying. The registry already
            // logged the failing module.
            let _ = stream.shutdown().await;
            record_connection_closed("aborted");
            return;
        }

        if !ctx.buffer().is_empty() {
            let mut work = WorkUnit::new(ctx.buffer().to_vec());
            match self.line.execute(&mut work) {
                Ok(_) => {
                    if let Err(err) = stream.write_all(work.payload()).await {
                        tracing::debug!(connection_id = %ctx.id(), error = %err, "Reply write failed");
                    }
                }
                Err(_) => {
                    // Already logged by the line. Nothing to reply with.
                }
            }
        }

        let _ = stream.shutdown().await;
        record_connection_closed("ok");
    }
}
