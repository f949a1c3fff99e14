//! Connectivity monitor
//!
//! Tracks whether the device is online. The state only reflects the last
//! signal reported to it: there is no debouncing and no reachability
//! probing, so it may lag the real network.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Shared online/offline signal
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor seeded from the platform's indicator
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx: Arc::new(tx) }
    }

    /// Current state
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Platform reported "online"
    pub fn set_online(&self) {
        self.set(true);
    }

    /// Platform reported "offline"
    pub fn set_offline(&self) {
        self.set(false);
    }

    /// Flip the current state, returning the new one
    pub fn toggle(&self) -> bool {
        let online = !self.is_online();
        self.set(online);
        online
    }

    fn set(&self, online: bool) {
        let changed = self.tx.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });
        if changed {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    /// Subscribe to transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
