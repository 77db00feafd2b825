//! Owns every collection's sync state machine and runs them in dependency
//! order.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, watch};

use super::barrier::Settlement;
use super::orchestrator::{CollectionPass, PassOutcome, SyncNotice};
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::state::{SyncPhase, SyncTrigger};

const NOTICE_CAPACITY: usize = 64;

pub struct SyncSupervisor {
    passes: Vec<Arc<dyn CollectionPass>>,
    notices: broadcast::Sender<SyncNotice>,
}

impl SyncSupervisor {
    /// Channel passes report failures on; hand its sender to each pass.
    pub fn notice_channel() -> broadcast::Sender<SyncNotice> {
        broadcast::channel(NOTICE_CAPACITY).0
    }

    /// `passes` are reordered so that parents always come first.
    pub fn new(
        mut passes: Vec<Arc<dyn CollectionPass>>,
        notices: broadcast::Sender<SyncNotice>,
    ) -> Self {
        passes.sort_by_key(|pass| pass.kind());
        Self { passes, notices }
    }

    /// Sync every collection concurrently.
    ///
    /// Passes are polled parents-first, so each parent re-arms its settle
    /// signal before any child looks at it.
    pub async fn sync_all(&self, trigger: SyncTrigger) -> Vec<(EntityKind, Result<PassOutcome>)> {
        tracing::debug!(trigger = trigger.label(), "Syncing all collections");
        let runs = self.passes.iter().map(|pass| async move {
            let outcome = pass.sync(trigger).await;
            (pass.kind(), outcome)
        });
        join_all(runs).await
    }

    /// Sync one collection together with its ancestors.
    pub async fn sync_collection(
        &self,
        kind: EntityKind,
        trigger: SyncTrigger,
    ) -> Result<PassOutcome> {
        let lineage = kind.lineage();
        let runs = self
            .passes
            .iter()
            .filter(|pass| lineage.contains(&pass.kind()))
            .map(|pass| async move { (pass.kind(), pass.sync(trigger).await) });

        join_all(runs)
            .await
            .into_iter()
            .find_map(|(pass_kind, outcome)| (pass_kind == kind).then_some(outcome))
            .unwrap_or_else(|| Err(Error::NotFound(format!("no sync registered for {kind}"))))
    }

    pub fn phase(&self, kind: EntityKind) -> Option<SyncPhase> {
        self.pass(kind).map(|pass| pass.phase())
    }

    pub fn phases(&self) -> Vec<(EntityKind, SyncPhase)> {
        self.passes
            .iter()
            .map(|pass| (pass.kind(), pass.phase()))
            .collect()
    }

    /// How the collection's latest pass ended, or `Pending` while one runs.
    pub fn settlement(&self, kind: EntityKind) -> Option<Settlement> {
        self.pass(kind).map(|pass| pass.settled().current())
    }

    /// Whether any collection is mid-pass.
    pub fn is_syncing(&self) -> bool {
        self.passes.iter().any(|pass| pass.phase().is_busy())
    }

    pub fn subscribe(&self, kind: EntityKind) -> Option<watch::Receiver<SyncPhase>> {
        self.pass(kind).map(|pass| pass.subscribe())
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    fn pass(&self, kind: EntityKind) -> Option<&Arc<dyn CollectionPass>> {
        self.passes.iter().find(|pass| pass.kind() == kind)
    }
}
