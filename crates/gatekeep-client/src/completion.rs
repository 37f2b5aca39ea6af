//! Completion signals.
//!
//! One flag per gate, raised only when the gate allows the visitor. A
//! blocked gate never raises its flag, so a page waiting on it waits
//! forever (the visitor has been sent elsewhere anyway). Flags cover one
//! page load and are lowered again when the next run begins.

use gatekeep_core::gate::GateKind;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Completion {
    automation: watch::Sender<bool>,
    country: watch::Sender<bool>,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            automation: watch::Sender::new(false),
            country: watch::Sender::new(false),
        }
    }

    fn sender(&self, kind: GateKind) -> &watch::Sender<bool> {
        match kind {
            GateKind::Automation => &self.automation,
            GateKind::Country => &self.country,
        }
    }

    pub(crate) fn signal(&self, kind: GateKind) {
        self.sender(kind).send_replace(true);
    }

    /// Lower both flags. Subscribers stay attached.
    pub(crate) fn reset(&self) {
        self.automation.send_replace(false);
        self.country.send_replace(false);
    }

    pub fn is_complete(&self, kind: GateKind) -> bool {
        *self.sender(kind).borrow()
    }

    pub fn subscribe(&self, kind: GateKind) -> watch::Receiver<bool> {
        self.sender(kind).subscribe()
    }

    /// Resolve once `kind` has completed.
    pub async fn wait(&self, kind: GateKind) {
        let mut rx = self.subscribe(kind);
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}
