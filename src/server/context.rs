//! Per-connection context.

use std::net::SocketAddr;
use std::time::Instant;

use crate::net::ConnectionId;
use crate::pipeline::Extensions;

/// Everything the handler chain knows about one accepted connection.
///
/// Exactly one worker owns the context for the connection's lifetime, so
/// handlers get `&mut` access with no locking. The server creates it at
/// accept and drops it exactly once at teardown, whether the chain
/// completed or aborted. Handlers communicate down-chain by mutating the
/// buffer or inserting typed values into the extension store.
#[derive(Debug)]
pub struct ConnectionContext {
    id: ConnectionId,
    peer_addr: SocketAddr,
    accepted_at: Instant,
    buffer: Vec<u8>,
    extensions: Extensions,
}

impl ConnectionContext {
    pub fn new(id: ConnectionId, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            accepted_at: Instant::now(),
            buffer: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// When the server accepted this connection.
    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// Bytes the server has read from the peer so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
