//! Event plumbing between the app, the scheduler and the UI.
//!
//! Backup triggers flow through an unbounded mpsc channel into the
//! debounce task; state changes fan out to UI subscribers over a broadcast
//! channel. Both replace the notification-center debouncing the subsystem
//! grew up with: coalescing happens in one place, the scheduler.

use std::sync::Mutex;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// A request to run a backup soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupTrigger {
    /// Debounce override in seconds. `None` = default debounce,
    /// `Some(0)` = forced, run immediately.
    pub delay_secs: Option<u64>,
}

impl BackupTrigger {
    pub fn is_forced(&self) -> bool {
        self.delay_secs == Some(0)
    }
}

/// Events broadcast to UI observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeEvent {
    /// Backup state changed: result, timestamps or activation. Observers
    /// re-read the config snapshot.
    BackupStateChanged,
}

pub struct EventBus {
    trigger_tx: mpsc::UnboundedSender<BackupTrigger>,
    trigger_rx: Mutex<Option<mpsc::UnboundedReceiver<BackupTrigger>>>,
    refresh_tx: broadcast::Sender<SafeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let (refresh_tx, _) = broadcast::channel(16);
        EventBus {
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            refresh_tx,
        }
    }

    /// Queue a backup trigger. Fire-and-forget: if the debounce task is
    /// gone the trigger is dropped, which only happens at shutdown.
    pub fn trigger(&self, delay_secs: Option<u64>) {
        let trigger = BackupTrigger { delay_secs };
        if self.trigger_tx.send(trigger).is_err() {
            debug!("trigger dropped, debounce task not running");
        }
    }

    /// Hand the trigger receiver to the debounce task. Yields `None` after
    /// the first call.
    pub fn take_trigger_receiver(&self) -> Option<mpsc::UnboundedReceiver<BackupTrigger>> {
        self.trigger_rx.lock().ok()?.take()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SafeEvent> {
        self.refresh_tx.subscribe()
    }

    /// Tell UI observers to refresh. Lossy by design: a subscriber that
    /// lags just refreshes on the next event.
    pub fn broadcast_refresh(&self) {
        let _ = self.refresh_tx.send(SafeEvent::BackupStateChanged);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
