//! Wire types shared by the sync client and the API server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RecordId;

/// One `(id, updatedAt)` pair of a client snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: RecordId,
    pub updated_at: DateTime<Utc>,
}

/// A single reconciliation instruction.
///
/// Serialized as `{"type": "insert" | "update" | "delete", "value": ...}`;
/// deletes carry only the record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SyncOp<T> {
    Insert(T),
    Update(T),
    Delete(RecordId),
}

impl<T> SyncOp<T> {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    /// Transform the payload of insert and update ops.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<SyncOp<U>, E> {
        Ok(match self {
            Self::Insert(value) => SyncOp::Insert(f(value)?),
            Self::Update(value) => SyncOp::Update(f(value)?),
            Self::Delete(id) => SyncOp::Delete(id),
        })
    }
}

/// Per-pass tally of applied ops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OpCounts {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl OpCounts {
    pub fn tally<T>(ops: &[SyncOp<T>]) -> Self {
        ops.iter().fold(Self::default(), |mut counts, op| {
            match op {
                SyncOp::Insert(_) => counts.inserted += 1,
                SyncOp::Update(_) => counts.updated += 1,
                SyncOp::Delete(_) => counts.deleted += 1,
            }
            counts
        })
    }

    pub const fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Body of `POST /v1/{entity}/remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    pub ids: Vec<RecordId>,
}
