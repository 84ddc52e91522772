//! Module contract subsystem.
//!
//! # Data Flow
//! ```text
//! ModuleCatalog builds Arc<dyn Module>
//!     → host drives init
//!     → hook_line / hook_server register a capability on a Roster
//!     → dispatch walks the roster in (priority, attach-order)
//!     → unhook removes the entry, destroy releases the module
//!
//! Lifecycle states:
//!     Constructed → Initialized → Destroyed
//!                      ↘ Failed (init error or hook rollback)
//! ```
//!
//! # Design Decisions
//! - Identity lives in an embedded `ModuleCore`; the trait's accessors are
//!   default methods over it, so modules implement the six lifecycle
//!   operations and nothing else
//! - Both dispatch surfaces share one roster implementation, so ordering
//!   and locking behave identically on the line and the server

pub mod contract;
pub mod core;
pub mod error;
pub(crate) mod roster;

pub use contract::{ConnectionHandler, DispatchReport, Module, PipelineStep};
pub use core::{LifecycleState, ModuleCore, ModuleKind, ModuleVersion};
pub use error::{
    ContractViolation, DispatchError, DispatchResult, LifecycleError, LifecycleOp,
    LifecycleResult, Surface,
};
