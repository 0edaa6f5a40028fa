//! Change counter shared by all stores
//!
//! Every mutation bumps the counter; presentation code holding a receiver
//! wakes up and re-reads whatever it displays. Derived values are never
//! cached, so the counter is the only invalidation signal.

use tokio::sync::watch;

#[derive(Debug)]
pub struct Revision {
    tx: watch::Sender<u64>,
}

impl Revision {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Record a mutation
    pub fn bump(&self) {
        self.tx.send_modify(|v| *v = v.wrapping_add(1));
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}
