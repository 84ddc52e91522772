//! The server-side attachment surface and its dispatch loop.

use std::sync::Arc;
use std::time::Instant;

use crate::module::roster::Roster;
use crate::module::{
    ConnectionHandler, ContractViolation, DispatchError, DispatchReport, Module, Surface,
};
use crate::net::ListenerHandle;
use crate::observability::record_dispatch;

use super::context::ConnectionContext;

/// Ordered registry of [`ConnectionHandler`]s.
///
/// Same ordering and locking contract as the execution line: ascending
/// priority, attach order on ties, the whole chain under one read lock.
/// Handlers must not attach or detach from inside
/// [`dispatch`](Self::dispatch).
pub struct ConnectionRegistry {
    handlers: Roster<dyn ConnectionHandler>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Roster::new(Surface::Server),
        }
    }

    /// Attach `handler` on behalf of `module`. The module must be in the
    /// Initialized state and not already attached here.
    pub fn attach(
        &self,
        module: Arc<dyn Module>,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<(), ContractViolation> {
        let name = module.name().to_owned();
        let priority = module.priority();
        self.handlers.attach(module, handler)?;
        tracing::debug!(
            module = %name,
            priority,
            handlers = self.handlers.len(),
            "Handler attached to server"
        );
        Ok(())
    }

    /// Detach the named module's handler. Fails without side effects if it
    /// is not attached.
    pub fn detach(&self, name: &str) -> Result<(), ContractViolation> {
        self.handlers.detach(name)?;
        tracing::debug!(
            module = %name,
            handlers = self.handlers.len(),
            "Handler detached from server"
        );
        Ok(())
    }

    /// Run the handler chain for one connection. The first handler error
    /// aborts the chain; the caller then tears the connection down.
    pub fn dispatch(
        &self,
        socket: &ListenerHandle,
        ctx: &mut ConnectionContext,
    ) -> Result<DispatchReport, DispatchError> {
        let started = Instant::now();
        let result = self.handlers.dispatch(|entry| {
            let _guard = entry.module.span().enter();
            entry.capability.update(socket, ctx)
        });
        match result {
            Ok(completed) => {
                record_dispatch("server", "ok", started);
                Ok(DispatchReport { completed })
            }
            Err(err) => {
                tracing::warn!(
                    module = %err.module(),
                    connection_id = %ctx.id(),
                    error = %err,
                    "Connection chain aborted"
                );
                record_dispatch("server", "aborted", started);
                Err(err)
            }
        }
    }

    /// Attached module names in execution order.
    pub fn snapshot(&self) -> Vec<String> {
        self.handlers.snapshot()
    }

    /// Attached `(name, priority)` pairs in execution order.
    pub fn manifest(&self) -> Vec<(String, i32)> {
        self.handlers.manifest()
    }

    /// Whether the named module is attached.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains(name)
    }

    /// Number of attached handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
