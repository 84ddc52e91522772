//! Execution line subsystem.
//!
//! # Data Flow
//! ```text
//! host wraps bytes in a WorkUnit
//!     → line.rs walks attached steps in (priority, attach-order)
//!     → each step rewrites the payload / extension store in place
//!     → aggregate report (or first error) returned to the host
//! ```
//!
//! # Design Decisions
//! - Steps are synchronous and run on the caller's task; the line never
//!   spawns
//! - The whole chain runs under one read lock, so detach acts as a barrier
//!   against in-flight executions

pub mod line;
pub mod work;

pub use line::ExecutionLine;
pub use work::{Extensions, WorkUnit};
