//! StateTracker: the Daemon's current operating mode
//!
//! Purely observational: nothing branches on the mode, transitions are
//! only logged.

use daemon_core::DaemonMode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Default)]
pub struct StateTracker {
    mode: Mutex<DaemonMode>,
    transitions: AtomicU64,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch mode. Returns false (and logs nothing) when already in `mode`.
    pub fn set_mode(&self, mode: DaemonMode) -> bool {
        let mut current = self.mode.lock().unwrap_or_else(|e| e.into_inner());
        if *current == mode {
            return false;
        }
        info!(from = %*current, to = %mode, "state transition");
        *current = mode;
        self.transitions.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn mode(&self) -> DaemonMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of effective transitions since start.
    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }
}
