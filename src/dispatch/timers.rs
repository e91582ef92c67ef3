//! Auto-dismiss timers for panels
//!
//! One timer per panel. Re-scheduling aborts the pending timer before
//! spawning the new one, so timers never stack.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::events::{Panel, UiEvent};

pub struct PanelTimers {
    pending: HashMap<Panel, JoinHandle<()>>,
    event_tx: broadcast::Sender<UiEvent>,
}

impl PanelTimers {
    pub fn new(event_tx: broadcast::Sender<UiEvent>) -> Self {
        Self {
            pending: HashMap::new(),
            event_tx,
        }
    }

    /// Hide `panel` after `after`, replacing any pending dismissal.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, panel: Panel, after: Duration) {
        if let Some(previous) = self.pending.remove(&panel) {
            if !previous.is_finished() {
                debug!(%panel, "resetting dismissal timer");
            }
            previous.abort();
        }

        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            debug!(%panel, "auto-dismissing panel");
            let _ = event_tx.send(UiEvent::HidePanel { panel });
        });
        self.pending.insert(panel, handle);
    }

    /// Drop the pending dismissal for `panel`. Returns whether one had not
    /// fired yet.
    pub fn cancel(&mut self, panel: Panel) -> bool {
        match self.pending.remove(&panel) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Number of timers that have not fired yet
    pub fn active(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for PanelTimers {
    fn drop(&mut self) {
        for handle in self.pending.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hides(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<Panel> {
        let mut panels = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::HidePanel { panel } = event {
                panels.push(panel);
            }
        }
        panels
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut timers = PanelTimers::new(tx);

        timers.schedule(Panel::Emergency, Duration::from_secs(5));
        assert_eq!(timers.active(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(hides(&mut rx), vec![Panel::Emergency]);
        assert_eq!(timers.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_resets() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut timers = PanelTimers::new(tx);

        timers.schedule(Panel::Identity, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(40)).await;
        timers.schedule(Panel::Identity, Duration::from_secs(60));
        assert_eq!(timers.active(), 1);

        // The first timer would have fired here
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(hides(&mut rx).is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(hides(&mut rx), vec![Panel::Identity]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut timers = PanelTimers::new(tx);

        timers.schedule(Panel::Error, Duration::from_secs(5));
        assert!(timers.cancel(Panel::Error));
        assert!(!timers.cancel(Panel::Error));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(hides(&mut rx).is_empty());
        assert_eq!(timers.active(), 0);
    }
}
