//! Teardown coordination for background monitors.

use tokio::sync::broadcast;

/// Broadcasts the end of the page to every background task.
#[derive(Debug, Clone)]
pub struct Teardown {
    tx: broadcast::Sender<()>,
}

impl Teardown {
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

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}
