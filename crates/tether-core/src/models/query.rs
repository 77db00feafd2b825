//! Saved query model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityKind, RecordId, SyncableRecord};
use crate::util::now_millis;

/// A query saved against one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedQuery {
    pub id: RecordId,
    /// Owning connection.
    #[serde(rename = "databaseId")]
    pub connection_id: RecordId,
    pub name: String,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedQuery {
    #[must_use]
    pub fn new(connection_id: RecordId, name: impl Into<String>, query: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: RecordId::new(),
            connection_id,
            name: name.into().trim().to_string(),
            query: query.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl SyncableRecord for SavedQuery {
    const KIND: EntityKind = EntityKind::Queries;

    fn id(&self) -> RecordId {
        self.id
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_query_serializes_database_id() {
        let connection_id = RecordId::new();
        let query = SavedQuery::new(connection_id, " daily ", "select 1");
        assert_eq!(query.name, "daily");

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["databaseId"], connection_id.as_str());
        assert_eq!(value["query"], "select 1");
    }
}
