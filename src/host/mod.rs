//! Module hosting subsystem.
//!
//! # Data Flow
//! ```text
//! [[modules]] config entries
//!     → catalog.rs builds Arc<dyn Module> per entry
//!     → engine.rs installs: init → hook(line) → hook(server)
//!     → live dispatch on both surfaces
//!     → uninstall: unhook(server) → unhook(line) → destroy
//!
//! On config reload:
//!     reconcile() diffs installed set vs new [[modules]] list
//! ```
//!
//! # Design Decisions
//! - The host is the only writer of lifecycle state; modules and surfaces
//!   observe it
//! - Partial hook failure rolls back already-hooked surfaces before the
//!   module is discarded

pub mod catalog;
pub mod engine;

pub use catalog::{ModuleBuilder, ModuleCatalog};
pub use engine::{ModuleHost, ModuleInfo, ReconcileSummary};
