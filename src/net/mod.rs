//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id allocation, lifetime tracking)
//!     → Hand off to the server's dispatch path
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so shutdown can drain in-flight work
//! - Modules only ever see an opaque `ListenerHandle`; byte-level I/O
//!   never leaves this layer and the server

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError, ListenerHandle};
