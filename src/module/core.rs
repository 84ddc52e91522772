//! Module identity and lifecycle state.
//!
//! # Responsibilities
//! - Carry the identity every module exposes (name, priority, kind, version)
//! - Hold the host-settable configuration file path
//! - Track lifecycle state (Constructed/Initialized/Failed/Destroyed)
//! - Own the tracing span modules log through

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::RwLock;

use tracing::Span;

use crate::observability::module_span;

/// Which dispatch surfaces a module plugs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Joins the per-connection handler chain only.
    Connection,
    /// Joins the ordered processing pipeline only.
    Pipeline,
    /// Joins both surfaces.
    Hybrid,
}

impl ModuleKind {
    /// True if modules of this kind hook the connection chain.
    pub fn handles_connections(self) -> bool {
        matches!(self, ModuleKind::Connection | ModuleKind::Hybrid)
    }

    /// True if modules of this kind hook the execution line.
    pub fn runs_pipeline(self) -> bool {
        matches!(self, ModuleKind::Pipeline | ModuleKind::Hybrid)
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::Connection => write!(f, "connection"),
            ModuleKind::Pipeline => write!(f, "pipeline"),
            ModuleKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Module version as an ordered `major.minor` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleVersion(pub u16, pub u16);

impl std::fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

/// Lifecycle state (0=Constructed, 1=Initialized, 2=Failed, 3=Destroyed).
///
/// Transitions are driven by the host engine only; modules and surfaces
/// read it, they never write it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed = 0,
    Initialized = 1,
    Failed = 2,
    Destroyed = 3,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Initialized,
            2 => LifecycleState::Failed,
            3 => LifecycleState::Destroyed,
            _ => LifecycleState::Constructed,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Constructed => write!(f, "constructed"),
            LifecycleState::Initialized => write!(f, "initialized"),
            LifecycleState::Failed => write!(f, "failed"),
            LifecycleState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// The identity block every module embeds and exposes through
/// [`Module::core`](super::Module::core).
///
/// Name, priority, kind, version and location are fixed at construction.
/// The configuration file path may be re-pointed by the host at any time.
#[derive(Debug)]
pub struct ModuleCore {
    name: String,
    priority: i32,
    kind: ModuleKind,
    version: ModuleVersion,
    location: PathBuf,
    conf_file: RwLock<Option<PathBuf>>,
    span: Span,
    state: AtomicU8,
}

impl ModuleCore {
    /// Create an identity block. Location defaults to `builtin`.
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        kind: ModuleKind,
        version: ModuleVersion,
    ) -> Self {
        let name = name.into();
        let span = module_span(&name, kind);
        Self {
            name,
            priority,
            kind,
            version,
            location: PathBuf::from("builtin"),
            conf_file: RwLock::new(None),
            span,
            state: AtomicU8::new(LifecycleState::Constructed as u8),
        }
    }

    /// Record where the module's code lives (a path for loadable modules,
    /// `builtin` for compiled-in ones).
    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = location.into();
        self
    }

    /// Seed the configuration file path at construction time.
    pub fn with_conf_file(self, path: impl Into<PathBuf>) -> Self {
        *self.conf_file.write().expect("conf file lock poisoned") = Some(path.into());
        self
    }

    /// Unique module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch priority. Lower values run earlier on both surfaces.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Which surfaces this module hooks.
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// Module version.
    pub fn version(&self) -> ModuleVersion {
        self.version
    }

    /// Where the module's code lives.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Current configuration file path, if any.
    pub fn conf_file(&self) -> Option<PathBuf> {
        self.conf_file.read().expect("conf file lock poisoned").clone()
    }

    /// Re-point the configuration file path. The module sees the new value
    /// on its next read; the engine does not restart it.
    pub fn set_conf_file(&self, path: impl Into<PathBuf>) {
        *self.conf_file.write().expect("conf file lock poisoned") = Some(path.into());
    }

    /// The span module code logs through. Carries the module name and kind
    /// as fields.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.load(Ordering::Relaxed).into()
    }

    /// Engine-only state transition.
    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }
}
