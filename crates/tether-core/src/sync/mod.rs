//! Reconciliation engine and client-side sync orchestration.

pub mod barrier;
mod orchestrator;
pub mod reconcile;
mod remote;
mod signals;
mod supervisor;

#[cfg(test)]
mod tests;

pub use barrier::{Gate, SettledSignal, Settlement};
pub use orchestrator::{CollectionPass, CollectionSync, PassOutcome, SkipReason, SyncNotice};
pub use reconcile::{reconcile, DEFAULT_GRACE};
pub use remote::{normalize_endpoint, HttpRemote, RemoteCollection, RemoteError, RemoteResult};
pub use signals::SyncSignals;
pub use supervisor::SyncSupervisor;
