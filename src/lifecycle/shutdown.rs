//! Shutdown coordination.

use tokio::sync::broadcast;

/// One-shot shutdown coordinator.
///
/// Provides a broadcast channel that long-running tasks subscribe to. Only
/// the first [`trigger`](Shutdown::trigger) has an effect; receivers should
/// subscribe before the trigger can happen so it is never missed.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Returns `false` when nobody was listening.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once `rx` observes a trigger or every sender is gone.
pub async fn triggered(mut rx: broadcast::Receiver<()>) {
    // Lagged cannot lose the signal: any message at all means shutdown.
    let _ = rx.recv().await;
}
