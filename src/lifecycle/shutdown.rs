//! Shutdown coordination for the server.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe
/// to. Triggering it stops the accept loop; open connections are then
/// drained through the connection tracker before modules are torn down.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_all_subscribers() {
        let shutdown = Shutdown::new();
        let mut rx_a = shutdown.subscribe();
        let mut rx_b = shutdown.subscribe();

        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();

        assert!(rx_a.recv().await.is_ok());
        assert!(rx_b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers_does_not_panic() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
    }
}
