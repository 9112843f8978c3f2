//! Shutdown coordination for the gateway process.

use std::future::Future;
use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Long-running tasks (the HTTP server, signal forwarders) subscribe to one
/// broadcast channel; a single `trigger` stops all of them.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// A future resolving once `trigger` is called.
    ///
    /// Subscribes eagerly, so a trigger after this call but before the first
    /// poll is not missed.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.subscribe();
        async move {
            let _ = rx.recv().await;
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
