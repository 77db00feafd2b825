//! Client-side collections.
//!
//! A [`Collection`] owns reads and writes for one entity type. Every write
//! goes through [`Collection::write`], which commits locally first and then,
//! for [`Write::Local`] only, mirrors the change to the server. Writes that
//! originate from a sync pass arrive as [`Write::FromSync`] and are never
//! sent back.

use std::sync::Arc;

use crate::db::{LocalStore, TableRecord};
use crate::error::{Error, Result};
use crate::models::RecordId;
use crate::protocol::{OpCounts, SnapshotEntry, SyncOp};
use crate::sync::RemoteCollection;
use crate::util::now_millis;

/// A single local change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    Insert(T),
    Update(T),
    Delete(RecordId),
}

/// Where a write came from, which decides whether it is mirrored.
#[derive(Debug, Clone, PartialEq)]
pub enum Write<T> {
    /// User edit; committed locally and mirrored to the server.
    Local(Mutation<T>),
    /// User edit that stays on this device.
    LocalOnly(Mutation<T>),
    /// Ops produced by a reconciliation pass; applied in one transaction.
    FromSync(Vec<SyncOp<T>>),
}

impl<T> Write<T> {
    pub const fn mirrors_remote(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

pub struct Collection<T: TableRecord> {
    store: LocalStore,
    remote: Arc<dyn RemoteCollection<T>>,
}

impl<T: TableRecord> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            remote: Arc::clone(&self.remote),
        }
    }
}

impl<T: TableRecord> Collection<T> {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteCollection<T>>) -> Self {
        Self { store, remote }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteCollection<T>> {
        &self.remote
    }

    pub async fn list(&self) -> Result<Vec<T>> {
        self.store.list().await
    }

    pub async fn list_by(&self, column: &str, parent: RecordId) -> Result<Vec<T>> {
        self.store.list_by(column, parent).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<T>> {
        self.store.get(id).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.store.count::<T>().await
    }

    pub async fn snapshot(&self) -> Result<Vec<SnapshotEntry>> {
        self.store.snapshot::<T>().await
    }

    pub async fn insert(&self, record: T) -> Result<T> {
        let id = record.id();
        self.write(Write::Local(Mutation::Insert(record))).await?;
        self.require(id).await
    }

    /// Save an edited record, stamping a fresh `updated_at`.
    pub async fn update(&self, record: T) -> Result<T> {
        let id = record.id();
        self.write(Write::Local(Mutation::Update(record))).await?;
        self.require(id).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<()> {
        self.write(Write::Local(Mutation::Delete(id))).await?;
        Ok(())
    }

    /// Apply ops from a reconciliation pass. Never mirrored.
    pub async fn apply_sync(&self, ops: Vec<SyncOp<T>>) -> Result<OpCounts> {
        self.write(Write::FromSync(ops)).await
    }

    /// Commit a write locally, then mirror it if it is a [`Write::Local`].
    ///
    /// A mirror failure is returned as [`Error::Mirror`]; the local commit
    /// stands either way.
    pub async fn write(&self, write: Write<T>) -> Result<OpCounts> {
        let mirror = write.mirrors_remote();
        match write {
            Write::FromSync(ops) => self.store.apply(ops).await,
            Write::Local(mutation) | Write::LocalOnly(mutation) => {
                let (counts, committed) = self.commit(mutation).await?;
                if mirror {
                    self.mirror(committed).await?;
                }
                Ok(counts)
            }
        }
    }

    async fn commit(&self, mutation: Mutation<T>) -> Result<(OpCounts, Mutation<T>)> {
        let mut counts = OpCounts::default();
        let committed = match mutation {
            Mutation::Insert(record) => {
                self.store.insert(&record).await?;
                counts.inserted = 1;
                Mutation::Insert(record)
            }
            Mutation::Update(mut record) => {
                record.touch(now_millis());
                self.store.update(&record).await?;
                counts.updated = 1;
                Mutation::Update(record)
            }
            Mutation::Delete(id) => {
                self.store.delete::<T>(id).await?;
                counts.deleted = 1;
                Mutation::Delete(id)
            }
        };
        Ok((counts, committed))
    }

    async fn mirror(&self, mutation: Mutation<T>) -> Result<()> {
        let result = match &mutation {
            Mutation::Insert(record) => self.remote.create(&record.prepare_for_remote()).await,
            Mutation::Update(record) => self.remote.update(&record.prepare_for_remote()).await,
            Mutation::Delete(id) => self.remote.remove(&[*id]).await,
        };

        result.map_err(|source| {
            tracing::warn!(
                entity = %T::KIND,
                error = %source,
                "Local change saved but not mirrored to the server"
            );
            Error::Mirror {
                entity: T::KIND,
                source,
            }
        })
    }

    async fn require(&self, id: RecordId) -> Result<T> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", T::KIND)))
    }
}
