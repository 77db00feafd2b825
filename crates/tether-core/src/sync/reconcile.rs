//! Snapshot reconciliation.
//!
//! Given a client's `(id, updatedAt)` snapshot and the owner's authoritative
//! records, compute the ops that converge the client. No sequence numbers or
//! tombstones are needed: a snapshot id missing from the authoritative set is
//! a delete.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{RecordId, SyncableRecord};
use crate::protocol::{SnapshotEntry, SyncOp};

/// Default tolerance before a server timestamp counts as newer.
pub const DEFAULT_GRACE: TimeDelta = TimeDelta::seconds(1);

/// Compute the ops for one collection.
///
/// Output order is updates, then inserts, then deletes. Each id yields at
/// most one op; duplicate snapshot ids collapse to their latest `updatedAt`.
pub fn reconcile<T: SyncableRecord>(
    snapshot: &[SnapshotEntry],
    authoritative: Vec<T>,
    grace: TimeDelta,
) -> Vec<SyncOp<T>> {
    let mut client: HashMap<RecordId, DateTime<Utc>> = HashMap::with_capacity(snapshot.len());
    for entry in snapshot {
        client
            .entry(entry.id)
            .and_modify(|seen| *seen = (*seen).max(entry.updated_at))
            .or_insert(entry.updated_at);
    }

    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    let mut present: HashSet<RecordId> = HashSet::with_capacity(authoritative.len());

    for record in authoritative {
        let id = record.id();
        if !present.insert(id) {
            continue;
        }
        match client.get(&id) {
            Some(client_updated_at) => {
                if is_newer(record.updated_at(), *client_updated_at, grace) {
                    updates.push(SyncOp::Update(record));
                }
            }
            None => inserts.push(SyncOp::Insert(record)),
        }
    }

    let mut deleted = HashSet::new();
    let deletes = snapshot
        .iter()
        .map(|entry| entry.id)
        .filter(|id| !present.contains(id) && deleted.insert(*id))
        .map(SyncOp::Delete);

    updates.into_iter().chain(inserts).chain(deletes).collect()
}

/// Whether `server` is strictly later than `client + grace`.
pub fn is_newer(server: DateTime<Utc>, client: DateTime<Utc>, grace: TimeDelta) -> bool {
    client
        .checked_add_signed(grace)
        .is_some_and(|threshold| server > threshold)
}
