//! Per-collection sync state machine.

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};

use super::barrier::{Gate, SettledSignal, Settlement};
use super::SyncSignals;
use crate::collection::Collection;
use crate::db::TableRecord;
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::protocol::OpCounts;
use crate::state::{SyncPhase, SyncTrigger};

/// Why a pass did nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingCredentials,
    Offline,
}

/// Result of asking a collection to sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    Skipped(SkipReason),
    Applied(OpCounts),
    /// Another pass was already running; this request joined it.
    Coalesced,
}

/// User-visible report of a failed pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncNotice {
    pub entity: EntityKind,
    pub trigger: &'static str,
    pub message: String,
}

/// Published when a pass ends so that joined triggers can report its result.
#[derive(Clone, Debug, Default)]
struct PassReport {
    failure: Option<String>,
}

/// Drives sync passes for one collection.
///
/// `Idle -> Fetching -> Applying -> Idle`, or `-> Error` when a pass fails.
/// Only one pass runs at a time; overlapping triggers wait for the running
/// pass and report [`PassOutcome::Coalesced`], or its error if it failed.
pub struct CollectionSync<T: TableRecord> {
    collection: Collection<T>,
    signals: SyncSignals,
    prepared: Gate,
    parent: Option<SettledSignal>,
    settled: SettledSignal,
    phase: watch::Sender<SyncPhase>,
    completed: watch::Sender<PassReport>,
    pass_lock: Mutex<()>,
    notices: broadcast::Sender<SyncNotice>,
}

impl<T: TableRecord> CollectionSync<T> {
    pub fn new(
        collection: Collection<T>,
        signals: SyncSignals,
        prepared: Gate,
        notices: broadcast::Sender<SyncNotice>,
    ) -> Self {
        Self {
            collection,
            signals,
            prepared,
            parent: None,
            settled: SettledSignal::new(),
            phase: watch::channel(SyncPhase::Idle).0,
            completed: watch::channel(PassReport::default()).0,
            pass_lock: Mutex::new(()),
            notices,
        }
    }

    /// Wait for `parent` to settle before each pass.
    #[must_use]
    pub fn after(mut self, parent: SettledSignal) -> Self {
        self.parent = Some(parent);
        self
    }

    pub const fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    /// Signal children wait on.
    pub fn settled(&self) -> SettledSignal {
        self.settled.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Run one pass, or join the one already running.
    ///
    /// The settle signal is re-armed before the first await so that a child
    /// polled after this future never sees the previous pass's settlement.
    pub async fn sync(&self, trigger: SyncTrigger) -> Result<PassOutcome> {
        let mut completed = self.completed.subscribe();
        let Ok(guard) = self.pass_lock.try_lock() else {
            tracing::debug!(
                entity = %T::KIND,
                trigger = trigger.label(),
                "Sync already running; joining it"
            );
            // The sender lives in `self`, so this only returns once the pass ends.
            let _ = completed.changed().await;
            let report = completed.borrow_and_update().clone();
            return match report.failure {
                Some(message) => Err(Error::JoinedPassFailed {
                    entity: T::KIND,
                    message,
                }),
                None => Ok(PassOutcome::Coalesced),
            };
        };
        self.settled.begin();
        self.phase.send_replace(SyncPhase::Idle);

        let result = self.run_pass(trigger).await;
        match &result {
            Ok(outcome) => {
                self.settled.settle(true);
                if let PassOutcome::Applied(counts) = outcome {
                    tracing::info!(
                        entity = %T::KIND,
                        trigger = trigger.label(),
                        inserted = counts.inserted,
                        updated = counts.updated,
                        deleted = counts.deleted,
                        "Sync pass complete"
                    );
                }
            }
            Err(error) => {
                self.settled.settle(false);
                self.phase.send_replace(SyncPhase::Error);
                tracing::error!(
                    entity = %T::KIND,
                    trigger = trigger.label(),
                    %error,
                    "Sync pass failed"
                );
                // No subscribers is fine; the notice is informational.
                let _ = self.notices.send(SyncNotice {
                    entity: T::KIND,
                    trigger: trigger.label(),
                    message: error.to_string(),
                });
            }
        }

        // Unlock before publishing: a trigger that still sees the lock held
        // must already be subscribed when the report goes out.
        drop(guard);
        self.completed.send_replace(PassReport {
            failure: result.as_ref().err().map(ToString::to_string),
        });
        result
    }

    async fn run_pass(&self, trigger: SyncTrigger) -> Result<PassOutcome> {
        self.prepared.wait().await;

        if !self.signals.has_credentials() {
            tracing::debug!(entity = %T::KIND, "Skipping sync: no credentials");
            return Ok(PassOutcome::Skipped(SkipReason::MissingCredentials));
        }
        if !self.signals.is_online() {
            tracing::debug!(entity = %T::KIND, "Skipping sync: offline");
            return Ok(PassOutcome::Skipped(SkipReason::Offline));
        }

        if let Some(parent) = &self.parent {
            if parent.wait().await == Settlement::Failed {
                return Err(Error::ParentSyncFailed {
                    parent: T::KIND.parent().unwrap_or(T::KIND),
                    child: T::KIND,
                });
            }
        }

        tracing::debug!(entity = %T::KIND, trigger = trigger.label(), "Sync pass started");
        self.phase.send_replace(SyncPhase::Fetching);
        let snapshot = self.collection.snapshot().await?;
        let ops = self.collection.remote().reconcile(&snapshot).await?;

        self.phase.send_replace(SyncPhase::Applying);
        let counts = self.collection.apply_sync(ops).await?;

        self.phase.send_replace(SyncPhase::Idle);
        Ok(PassOutcome::Applied(counts))
    }
}

/// Object-safe view of a [`CollectionSync`] for the supervisor.
#[async_trait::async_trait]
pub trait CollectionPass: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn phase(&self) -> SyncPhase;

    fn subscribe(&self) -> watch::Receiver<SyncPhase>;

    fn settled(&self) -> SettledSignal;

    async fn sync(&self, trigger: SyncTrigger) -> Result<PassOutcome>;
}

#[async_trait::async_trait]
impl<T: TableRecord> CollectionPass for CollectionSync<T> {
    fn kind(&self) -> EntityKind {
        T::KIND
    }

    fn phase(&self) -> SyncPhase {
        Self::phase(self)
    }

    fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        Self::subscribe(self)
    }

    fn settled(&self) -> SettledSignal {
        Self::settled(self)
    }

    async fn sync(&self, trigger: SyncTrigger) -> Result<PassOutcome> {
        Self::sync(self, trigger).await
    }
}
