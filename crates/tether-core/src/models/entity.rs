//! Entity kinds and the shape every synced record shares

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::RecordId;
use crate::protocol::SnapshotEntry;

/// The synced collections, in dependency order (parents before children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "connections")]
    Connections,
    #[serde(rename = "queries")]
    Queries,
    #[serde(rename = "chats")]
    Chats,
    #[serde(rename = "chats-messages")]
    ChatMessages,
}

impl EntityKind {
    /// Every kind, leaves first.
    pub const ALL: [Self; 4] = [
        Self::Connections,
        Self::Queries,
        Self::Chats,
        Self::ChatMessages,
    ];

    /// Path segment used on the wire.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connections => "connections",
            Self::Queries => "queries",
            Self::Chats => "chats",
            Self::ChatMessages => "chats-messages",
        }
    }

    /// The collection whose pass must settle before this one starts.
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Connections => None,
            Self::Queries | Self::Chats => Some(Self::Connections),
            Self::ChatMessages => Some(Self::Chats),
        }
    }

    /// This kind preceded by its ancestors, root first.
    pub fn lineage(self) -> Vec<Self> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| crate::Error::NotFound(format!("entity type `{}`", s.trim())))
    }
}

/// Behaviour shared by every record that takes part in reconciliation.
pub trait SyncableRecord:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Collection this record belongs to.
    const KIND: EntityKind;

    fn id(&self) -> RecordId;

    fn updated_at(&self) -> DateTime<Utc>;

    /// Stamp a new `updated_at` after a local edit.
    fn touch(&mut self, at: DateTime<Utc>);

    fn snapshot_entry(&self) -> SnapshotEntry {
        SnapshotEntry {
            id: self.id(),
            updated_at: self.updated_at(),
        }
    }

    /// Shape of the record as mirrored to the server.
    fn prepare_for_remote(&self) -> Self {
        self.clone()
    }

    /// Combine a record received from sync with the local copy it replaces.
    fn merge_incoming(incoming: Self, _local: Option<&Self>) -> Self {
        incoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_parses_wire_names() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("notes".parse::<EntityKind>().is_err());
    }

    #[test]
    fn entity_kind_serde_matches_path_segment() {
        let json = serde_json::to_string(&EntityKind::ChatMessages).unwrap();
        assert_eq!(json, "\"chats-messages\"");
    }

    #[test]
    fn lineage_lists_ancestors_first() {
        assert_eq!(
            EntityKind::ChatMessages.lineage(),
            vec![
                EntityKind::Connections,
                EntityKind::Chats,
                EntityKind::ChatMessages
            ]
        );
        assert_eq!(
            EntityKind::Connections.lineage(),
            vec![EntityKind::Connections]
        );
    }

    #[test]
    fn all_kinds_come_after_their_parent() {
        for (index, kind) in EntityKind::ALL.iter().enumerate() {
            if let Some(parent) = kind.parent() {
                let parent_index = EntityKind::ALL.iter().position(|k| *k == parent).unwrap();
                assert!(parent_index < index);
            }
        }
    }
}
