// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A rendezvous point for holding a thread until a test lets it continue.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Blocks the thread that calls [`Gate::pass`] until [`Gate::release`].
///
/// The test side can wait for the blocked side to arrive with
/// [`Gate::wait_entered`]. Each `release` lets exactly one `pass` through;
/// releases issued early are remembered.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    entered_tx: UnboundedSender<()>,
    entered_rx: Mutex<UnboundedReceiver<()>>,
    release_tx: UnboundedSender<()>,
    release_rx: Mutex<UnboundedReceiver<()>>,
}

impl Gate {
    pub fn new() -> Self {
        let (entered_tx, entered_rx) = unbounded_channel();
        let (release_tx, release_rx) = unbounded_channel();
        Self {
            inner: Arc::new(GateInner {
                entered_tx,
                entered_rx: Mutex::new(entered_rx),
                release_tx,
                release_rx: Mutex::new(release_rx),
            }),
        }
    }

    /// Announce arrival, then block until released.
    pub fn pass(&self) {
        let _ = self.inner.entered_tx.send(());
        let mut release = self
            .inner
            .release_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = release.blocking_recv();
    }

    /// Block until some thread is inside [`Gate::pass`].
    pub fn wait_entered(&self) {
        let mut entered = self
            .inner
            .entered_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let _ = entered.blocking_recv();
    }

    /// Let one blocked (or future) `pass` continue.
    pub fn release(&self) {
        let _ = self.inner.release_tx.send(());
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_waits_for_release() {
        let gate = Gate::new();
        let passer = gate.clone();
        let handle = std::thread::spawn(move || {
            passer.pass();
            42
        });

        gate.wait_entered();
        assert!(!handle.is_finished());
        gate.release();
        assert_eq!(handle.join().unwrap(), 42);
    }

    #[test]
    fn early_release_is_remembered() {
        let gate = Gate::new();
        gate.release();
        gate.pass();
        gate.wait_entered();
    }
}
