//! Span construction for module and connection identity.
//!
//! # Responsibilities
//! - Create spans for module dispatch and connection handling
//! - Keep span field names consistent so log lines correlate
//!
//! # Design Decisions
//! - A module's span is built once at construction and re-entered on
//!   every dispatch, so every log line a module emits carries its name
//! - Connection spans wrap the whole per-connection task

use std::net::SocketAddr;

use tracing::Span;

use crate::module::ModuleKind;
use crate::net::ConnectionId;

/// Span entered around every dispatch into the named module.
pub fn module_span(name: &str, kind: ModuleKind) -> Span {
    tracing::info_span!("module", module = %name, kind = %kind)
}

/// Span wrapping one connection task from accept to teardown.
pub fn connection_span(id: ConnectionId, peer: SocketAddr) -> Span {
    tracing::info_span!("connection", connection_id = %id, peer = %peer)
}
