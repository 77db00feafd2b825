//! Store-backed reconciliation and the owner-scoped mutation surface.

use chrono::TimeDelta;
use serde_json::Value;
use tether_core::models::{Chat, ChatMessage, Connection, EntityKind, RecordId, SavedQuery};
use tether_core::protocol::{OpCounts, SnapshotEntry};
use tether_core::sync::reconcile;
use tether_core::util::user_fingerprint;

use crate::error::AppError;
use crate::store::{stamp, ServerRecord, ServerStore};

/// Runs `$body` with `$record` bound to the record type of `$kind`.
macro_rules! with_record_type {
    ($kind:expr, $record:ident => $body:expr) => {
        match $kind {
            EntityKind::Connections => {
                type $record = Connection;
                $body
            }
            EntityKind::Queries => {
                type $record = SavedQuery;
                $body
            }
            EntityKind::Chats => {
                type $record = Chat;
                $body
            }
            EntityKind::ChatMessages => {
                type $record = ChatMessage;
                $body
            }
        }
    };
}

#[derive(Clone)]
pub struct Reconciler {
    store: ServerStore,
    grace: TimeDelta,
}

impl Reconciler {
    pub const fn new(store: ServerStore, grace: TimeDelta) -> Self {
        Self { store, grace }
    }

    #[cfg(test)]
    pub const fn store(&self) -> &ServerStore {
        &self.store
    }

    /// Ops that converge `snapshot` with `owner`'s records of `kind`,
    /// serialized as `[{type, value}]`.
    pub async fn reconcile(
        &self,
        owner: &str,
        kind: EntityKind,
        snapshot: &[SnapshotEntry],
    ) -> Result<Value, AppError> {
        if let Some(entry) = snapshot.iter().find(|entry| !entry.id.is_v7()) {
            return Err(AppError::bad_request(format!(
                "snapshot id {} is not a UUIDv7",
                entry.id
            )));
        }
        with_record_type!(kind, Record => self.reconcile_as::<Record>(owner, snapshot).await)
    }

    pub async fn create(&self, owner: &str, kind: EntityKind, body: Value) -> Result<(), AppError> {
        with_record_type!(kind, Record => self.create_as::<Record>(owner, body).await)
    }

    pub async fn update(
        &self,
        owner: &str,
        kind: EntityKind,
        id: RecordId,
        body: Value,
    ) -> Result<(), AppError> {
        with_record_type!(kind, Record => self.update_as::<Record>(owner, id, body).await)
    }

    pub async fn remove(
        &self,
        owner: &str,
        kind: EntityKind,
        ids: &[RecordId],
    ) -> Result<u64, AppError> {
        self.store.user_secret(owner).await?;
        let removed = with_record_type!(kind, Record => self.store.remove::<Record>(owner, ids).await)?;
        tracing::info!(
            entity = %kind,
            user = user_fingerprint(owner),
            requested = ids.len(),
            removed,
            "Removed records"
        );
        Ok(removed)
    }

    async fn reconcile_as<T: ServerRecord>(
        &self,
        owner: &str,
        snapshot: &[SnapshotEntry],
    ) -> Result<Value, AppError> {
        let secret = self.store.user_secret(owner).await?;
        let records = self.store.records::<T>(owner).await?;

        let ops = reconcile(snapshot, records, self.grace)
            .into_iter()
            .map(|op| op.try_map(|record| record.unveil(&secret)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| AppError::internal(format!("could not unveil {}: {error}", T::KIND)))?;

        let counts = OpCounts::tally(&ops);
        tracing::info!(
            entity = %T::KIND,
            user = user_fingerprint(owner),
            snapshot = snapshot.len(),
            inserted = counts.inserted,
            updated = counts.updated,
            deleted = counts.deleted,
            "Reconciled snapshot"
        );
        Ok(serde_json::to_value(ops)?)
    }

    async fn create_as<T: ServerRecord>(&self, owner: &str, body: Value) -> Result<(), AppError> {
        let record: T = parse_record(body)?;
        if !record.id().is_v7() {
            return Err(AppError::bad_request(format!(
                "record id {} is not a UUIDv7",
                record.id()
            )));
        }

        let secret = self.store.user_secret(owner).await?;
        let record = seal(record, &secret)?;
        let inserted = self.store.create(owner, &record).await?;
        tracing::info!(
            entity = %T::KIND,
            user = user_fingerprint(owner),
            inserted,
            "Created record"
        );
        Ok(())
    }

    async fn update_as<T: ServerRecord>(
        &self,
        owner: &str,
        id: RecordId,
        body: Value,
    ) -> Result<(), AppError> {
        let record: T = parse_record(body)?;
        if record.id() != id {
            return Err(AppError::bad_request("record id does not match the path"));
        }

        let secret = self.store.user_secret(owner).await?;
        let record = seal(stamp(record), &secret)?;
        self.store.update(owner, &record).await?;
        tracing::info!(entity = %T::KIND, user = user_fingerprint(owner), "Updated record");
        Ok(())
    }
}

fn parse_record<T: ServerRecord>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body)
        .map_err(|error| AppError::bad_request(format!("invalid {} record: {error}", T::KIND)))
}

fn seal<T: ServerRecord>(record: T, secret: &str) -> Result<T, AppError> {
    record
        .seal(secret)
        .map_err(|error| AppError::internal(format!("could not seal {}: {error}", T::KIND)))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tether_core::models::{DatabaseKind, SyncableRecord};
    use tether_core::protocol::SyncOp;

    use super::*;

    async fn reconciler() -> Reconciler {
        let store = ServerStore::open_in_memory().await.unwrap();
        store.provision_user("alice").await.unwrap();
        Reconciler::new(store, TimeDelta::seconds(1))
    }

    fn entry(id: RecordId, updated_at: DateTime<Utc>) -> SnapshotEntry {
        SnapshotEntry { id, updated_at }
    }

    fn ops<T: ServerRecord>(value: Value) -> Vec<SyncOp<T>> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_snapshot_receives_unveiled_inserts() {
        let reconciler = reconciler().await;
        let connection = Connection::new("prod", DatabaseKind::Postgres, "postgres://app:pw@db/app");
        reconciler
            .create("alice", EntityKind::Connections, serde_json::to_value(&connection).unwrap())
            .await
            .unwrap();

        let stored = reconciler.store().records::<Connection>("alice").await.unwrap();
        assert_ne!(stored[0].connection_string, connection.connection_string);

        let result = reconciler
            .reconcile("alice", EntityKind::Connections, &[])
            .await
            .unwrap();
        assert_eq!(ops::<Connection>(result), vec![SyncOp::Insert(connection)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_snapshot_gets_update_and_missing_ids_get_deletes() {
        let reconciler = reconciler().await;
        let chat = Chat::new(RecordId::new(), Some("First".to_string()));
        reconciler
            .create("alice", EntityKind::Chats, serde_json::to_value(&chat).unwrap())
            .await
            .unwrap();

        let mut renamed = chat.clone();
        renamed.title = Some("Renamed".to_string());
        reconciler
            .update("alice", EntityKind::Chats, chat.id, serde_json::to_value(&renamed).unwrap())
            .await
            .unwrap();

        let gone = RecordId::new();
        let stale = chat.updated_at() - TimeDelta::seconds(5);
        let result = reconciler
            .reconcile(
                "alice",
                EntityKind::Chats,
                &[entry(chat.id, stale), entry(gone, stale)],
            )
            .await
            .unwrap();

        let ops = ops::<Chat>(result);
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], SyncOp::Update(chat) if chat.title.as_deref() == Some("Renamed")));
        assert_eq!(ops[1], SyncOp::Delete(gone));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn current_snapshot_yields_nothing() {
        let reconciler = reconciler().await;
        let query = SavedQuery::new(RecordId::new(), "q", "SELECT 1");
        reconciler
            .create("alice", EntityKind::Queries, serde_json::to_value(&query).unwrap())
            .await
            .unwrap();

        let result = reconciler
            .reconcile("alice", EntityKind::Queries, &[query.snapshot_entry()])
            .await
            .unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_unknown_owner_and_non_v7_ids() {
        let reconciler = reconciler().await;
        assert!(matches!(
            reconciler.reconcile("mallory", EntityKind::Chats, &[]).await,
            Err(AppError::Unauthorized(_))
        ));

        let v4 = RecordId::from(uuid::Uuid::from_u128(0x1234_5678_9abc_4def_8000_0000_0000_0001));
        assert!(matches!(
            reconciler
                .reconcile("alice", EntityKind::Chats, &[entry(v4, Utc::now())])
                .await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn undecryptable_secret_fails_the_whole_call() {
        let reconciler = reconciler().await;
        let connection = Connection::new("raw", DatabaseKind::Mysql, "mysql://db/app");
        reconciler.store().create("alice", &connection).await.unwrap();

        assert!(matches!(
            reconciler.reconcile("alice", EntityKind::Connections, &[]).await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_requires_matching_id() {
        let reconciler = reconciler().await;
        let chat = Chat::new(RecordId::new(), None);
        let err = reconciler
            .update("alice", EntityKind::Chats, RecordId::new(), serde_json::to_value(&chat).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
