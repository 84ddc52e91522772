//! The module contract.
//!
//! # Responsibilities
//! - Define what every pluggable component implements ([`Module`])
//! - Define the two capability traits the surfaces dispatch through
//!   ([`ConnectionHandler`], [`PipelineStep`])
//!
//! # Design Decisions
//! - Hooks take `self: Arc<Self>` so a module registers *itself* on the
//!   surface it is handed; the host never needs to know which capability
//!   trait a module implements.
//! - All lifecycle operations return `Result` status. Nothing in the
//!   contract panics; a failing module is skipped or unloaded by the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Span;

use super::core::{ModuleCore, ModuleKind, ModuleVersion};
use super::error::{DispatchResult, LifecycleResult};
use crate::net::ListenerHandle;
use crate::pipeline::{ExecutionLine, WorkUnit};
use crate::server::{ConnectionContext, Server};

/// A pluggable server component.
///
/// The host drives the lifecycle in a fixed order: `init`, then one hook per
/// surface the module's [`kind`](Module::kind) declares, then live dispatch,
/// then the matching unhooks, then `destroy`. The host guarantees:
///
/// - no hook runs before `init` succeeded,
/// - no surface is hooked twice without an intervening unhook,
/// - no unhook runs for a surface that was never hooked,
/// - if a later hook fails, surfaces hooked earlier are unhooked again
///   before the module is discarded,
/// - `destroy` runs only after every live attachment is gone, so no
///   dispatch path invokes the module once `destroy` begins.
///
/// Modules whose kind skips a surface implement that surface's hook pair as
/// `Ok(())` one-liners; the host never calls them.
pub trait Module: Send + Sync + 'static {
    /// The identity block backing the accessors below.
    fn core(&self) -> &ModuleCore;

    /// Prepare internal state. No attachment exists yet and the module must
    /// not touch either surface.
    fn init(&self) -> LifecycleResult;

    /// Attach to the execution line, typically by registering a
    /// [`PipelineStep`] with [`ExecutionLine::attach`].
    fn hook_line(self: Arc<Self>, line: &ExecutionLine) -> LifecycleResult;

    /// Attach to the server's connection chain, typically by registering a
    /// [`ConnectionHandler`] with [`Server::attach`].
    fn hook_server(self: Arc<Self>, server: &Server) -> LifecycleResult;

    /// Detach from the execution line. Mirrors a successful `hook_line`.
    fn unhook_line(&self, line: &ExecutionLine) -> LifecycleResult;

    /// Detach from the server's connection chain. Mirrors a successful
    /// `hook_server`.
    fn unhook_server(&self, server: &Server) -> LifecycleResult;

    /// Release internal resources. Runs exactly once, after all unhooks.
    fn destroy(&self) -> LifecycleResult;

    /// Unique module name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Dispatch priority. Lower values run earlier.
    fn priority(&self) -> i32 {
        self.core().priority()
    }

    /// Which surfaces this module hooks.
    fn kind(&self) -> ModuleKind {
        self.core().kind()
    }

    /// Module version.
    fn version(&self) -> ModuleVersion {
        self.core().version()
    }

    /// Where the module's code lives.
    fn location(&self) -> &Path {
        self.core().location()
    }

    /// Current configuration file path, if any.
    fn conf_file(&self) -> Option<PathBuf> {
        self.core().conf_file()
    }

    /// Re-point the configuration file path.
    fn set_conf_file(&self, path: PathBuf) {
        self.core().set_conf_file(path)
    }

    /// The span module code logs through.
    fn span(&self) -> &Span {
        self.core().span()
    }
}

/// Outcome of a chain that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// How many attached entries ran.
    pub completed: usize,
}

/// Per-connection capability. Connection-kind modules register one of these
/// on the server's chain.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle one connection in priority position. The context is owned by
    /// the connection's worker; mutations are visible to every handler that
    /// runs later in the chain.
    ///
    /// `Ok(())` continues the chain. Any error aborts it: no later handler
    /// runs and the server tears the connection down exactly once.
    fn update(&self, socket: &ListenerHandle, ctx: &mut ConnectionContext) -> DispatchResult;
}

/// Pipeline capability. Pipeline-kind modules register one of these on the
/// execution line.
pub trait PipelineStep: Send + Sync + 'static {
    /// Process one unit of work in priority position. Same abort semantics
    /// as [`ConnectionHandler::update`]: any error stops the chain.
    fn process(&self, work: &mut WorkUnit) -> DispatchResult;
}
