//! Server subsystem: the connection-side dispatch surface and its driver.
//!
//! # Data Flow
//! ```text
//! listener accepts socket
//!     → core.rs spawns a worker, builds one ConnectionContext
//!     → registry.rs walks attached handlers in (priority, attach-order)
//!     → context buffer becomes one WorkUnit for the execution line
//!     → reply written, context dropped exactly once
//! ```
//!
//! # Design Decisions
//! - Handlers are synchronous; the worker task owns all socket I/O
//! - A chain abort tears the connection down without replying; the server
//!   itself keeps running

pub mod context;
pub mod core;
pub mod registry;

pub use context::ConnectionContext;
pub use core::Server;
pub use registry::ConnectionRegistry;
