//! Gates that order sync passes.

use std::sync::Arc;

use tokio::sync::watch;

/// One-shot gate; once opened it stays open.
///
/// Used for "local store prepared": every pass waits on it before doing
/// anything else.
#[derive(Clone, Debug)]
pub struct Gate {
    tx: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            tx: Arc::new(watch::channel(false).0),
        }
    }

    pub fn opened() -> Self {
        let gate = Self::closed();
        gate.open();
        gate
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|open| *open).await;
    }
}

/// How a collection's latest pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// A pass has started (or none has run yet) and has not finished.
    Pending,
    /// The pass committed, found nothing to do, or was skipped by a guard.
    Settled,
    /// The pass failed; dependents must not proceed.
    Failed,
}

/// Settle signal of one collection, awaited by its children.
///
/// Re-armed to `Pending` at the start of every pass and released when the
/// pass ends. Starts out `Pending`, so a child never overtakes a parent
/// that has not run yet.
#[derive(Clone, Debug)]
pub struct SettledSignal {
    tx: Arc<watch::Sender<Settlement>>,
}

impl Default for SettledSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SettledSignal {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::channel(Settlement::Pending).0),
        }
    }

    pub fn begin(&self) {
        self.tx.send_replace(Settlement::Pending);
    }

    pub fn settle(&self, succeeded: bool) {
        self.tx.send_replace(if succeeded {
            Settlement::Settled
        } else {
            Settlement::Failed
        });
    }

    pub fn current(&self) -> Settlement {
        *self.tx.borrow()
    }

    /// Wait until the current pass ends and report how.
    pub async fn wait(&self) -> Settlement {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|state| *state != Settlement::Pending)
            .await
            .map_or(Settlement::Failed, |state| *state)
    }
}
