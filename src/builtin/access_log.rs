//! Connection access logging.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ModuleConfig;
use crate::module::{
    ConnectionHandler, DispatchResult, LifecycleResult, Module, ModuleCore, ModuleKind,
    ModuleVersion,
};
use crate::net::ListenerHandle;
use crate::pipeline::ExecutionLine;
use crate::server::{ConnectionContext, Server};

/// Stamp the access logger leaves in the connection context. Handlers later
/// in the chain read it to tell a logged connection from an unlogged one.
#[derive(Debug, Clone, Copy)]
pub struct AccessStamp {
    pub peer: SocketAddr,
    pub logged_at: Instant,
}

/// Logs one line per accepted connection and stamps the context.
///
/// Runs early in the handler chain (configure a low priority) so every
/// connection is logged even when a later handler aborts it.
pub struct AccessLog {
    core: ModuleCore,
}

impl AccessLog {
    /// Build from a config entry. Name and priority come from the entry so
    /// the configured identity matches what the surfaces see.
    pub fn from_config(config: &ModuleConfig) -> Arc<Self> {
        let mut core = ModuleCore::new(
            &config.name,
            config.priority,
            ModuleKind::Connection,
            ModuleVersion(1, 0),
        );
        if let Some(path) = &config.conf_file {
            core = core.with_conf_file(path);
        }
        Arc::new(Self { core })
    }
}

impl Module for AccessLog {
    fn core(&self) -> &ModuleCore {
        &self.core
    }

    fn init(&self) -> LifecycleResult {
        tracing::debug!(module = %self.name(), "Access log ready");
        Ok(())
    }

    fn hook_line(self: Arc<Self>, _line: &ExecutionLine) -> LifecycleResult {
        Ok(())
    }

    fn hook_server(self: Arc<Self>, server: &Server) -> LifecycleResult {
        server.attach(self.clone(), self)?;
        Ok(())
    }

    fn unhook_line(&self, _line: &ExecutionLine) -> LifecycleResult {
        Ok(())
    }

    fn unhook_server(&self, server: &Server) -> LifecycleResult {
        server.detach(self.name())?;
        Ok(())
    }

    fn destroy(&self) -> LifecycleResult {
        Ok(())
    }
}

impl ConnectionHandler for AccessLog {
    fn update(&self, socket: &ListenerHandle, ctx: &mut ConnectionContext) -> DispatchResult {
        tracing::info!(
            peer = %ctx.peer_addr(),
            local = %socket.local_addr(),
            bytes = ctx.buffer().len(),
            "Connection accepted"
        );
        let stamp = AccessStamp {
            peer: ctx.peer_addr(),
            logged_at: Instant::now(),
        };
        ctx.extensions_mut().insert(stamp);
        Ok(())
    }
}
