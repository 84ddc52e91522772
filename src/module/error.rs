//! Error taxonomy for the module engine.

use thiserror::Error;

use super::core::LifecycleState;

/// The dispatch surface an operation targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// The ordered processing pipeline.
    Line,
    /// The per-connection handler chain.
    Server,
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Line => write!(f, "execution line"),
            Surface::Server => write!(f, "server"),
        }
    }
}

/// Which lifecycle operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Init,
    Hook(Surface),
    Unhook(Surface),
    Destroy,
}

impl std::fmt::Display for LifecycleOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleOp::Init => write!(f, "init"),
            LifecycleOp::Hook(surface) => write!(f, "hook({surface})"),
            LifecycleOp::Unhook(surface) => write!(f, "unhook({surface})"),
            LifecycleOp::Destroy => write!(f, "destroy"),
        }
    }
}

/// A caller broke the attachment contract. The surface or host rejects the
/// operation without changing any state.
#[derive(Debug, Error)]
pub enum ContractViolation {
    /// The module already holds an attachment on this surface.
    #[error("module `{module}` is already attached to the {surface}")]
    AlreadyAttached { module: String, surface: Surface },

    /// Detach was requested for a module the surface does not hold.
    #[error("module `{module}` is not attached to the {surface}")]
    NotAttached { module: String, surface: Surface },

    /// Attach was requested outside the Initialized state.
    #[error("module `{module}` is {state}, not initialized; refusing to attach to the {surface}")]
    NotInitialized {
        module: String,
        surface: Surface,
        state: LifecycleState,
    },

    /// A module with this name is already installed.
    #[error("a module named `{0}` is already installed")]
    DuplicateModule(String),

    /// No installed module carries this name.
    #[error("no module named `{0}` is installed")]
    UnknownModule(String),
}

/// Errors from the lifecycle protocol (init/hook/unhook/destroy).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A lifecycle operation reported failure from inside the module.
    #[error("module `{module}`: {op} failed: {reason}")]
    Module {
        module: String,
        op: LifecycleOp,
        reason: String,
    },

    /// The engine rejected the operation before it reached the module.
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

impl LifecycleError {
    /// Failure reported by a module's `init`.
    pub fn init(module: impl Into<String>, reason: impl Into<String>) -> Self {
        LifecycleError::Module {
            module: module.into(),
            op: LifecycleOp::Init,
            reason: reason.into(),
        }
    }

    /// Failure reported while hooking a surface.
    pub fn hook(module: impl Into<String>, surface: Surface, reason: impl Into<String>) -> Self {
        LifecycleError::Module {
            module: module.into(),
            op: LifecycleOp::Hook(surface),
            reason: reason.into(),
        }
    }

    /// Failure reported while unhooking a surface.
    pub fn unhook(module: impl Into<String>, surface: Surface, reason: impl Into<String>) -> Self {
        LifecycleError::Module {
            module: module.into(),
            op: LifecycleOp::Unhook(surface),
            reason: reason.into(),
        }
    }

    /// Failure reported by a module's `destroy`.
    pub fn destroy(module: impl Into<String>, reason: impl Into<String>) -> Self {
        LifecycleError::Module {
            module: module.into(),
            op: LifecycleOp::Destroy,
            reason: reason.into(),
        }
    }
}

/// A handler or step aborted its chain. Fatal for that connection or work
/// unit only; the server keeps running.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A connection handler failed.
    #[error("connection handler `{module}` failed: {reason}")]
    Handler { module: String, reason: String },

    /// A pipeline step failed.
    #[error("pipeline step `{module}` failed: {reason}")]
    Step { module: String, reason: String },
}

impl DispatchError {
    /// Abort raised by a connection handler.
    pub fn handler(module: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::Handler {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Abort raised by a pipeline step.
    pub fn step(module: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError::Step {
            module: module.into(),
            reason: reason.into(),
        }
    }

    /// Name of the module that aborted the chain.
    pub fn module(&self) -> &str {
        match self {
            DispatchError::Handler { module, .. } | DispatchError::Step { module, .. } => module,
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// Result type for dispatch operations.
pub type DispatchResult<T = ()> = Result<T, DispatchError>;
