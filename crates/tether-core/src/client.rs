//! Wires the local store, remote client and sync supervisor together.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::collection::Collection;
use crate::config::ClientConfig;
use crate::db::{LocalStore, TableRecord};
use crate::error::Result;
use crate::models::{Chat, ChatMessage, Connection, EntityKind, RecordId, SavedQuery, SyncableRecord};
use crate::protocol::{SnapshotEntry, SyncOp};
use crate::state::{SyncPhase, SyncTrigger};
use crate::sync::{
    CollectionPass, CollectionSync, Gate, HttpRemote, PassOutcome, RemoteCollection, RemoteError,
    RemoteResult, SyncNotice, SyncSignals, SyncSupervisor,
};

/// Remote endpoints for every collection.
#[derive(Clone)]
pub struct Remotes {
    pub connections: Arc<dyn RemoteCollection<Connection>>,
    pub queries: Arc<dyn RemoteCollection<SavedQuery>>,
    pub chats: Arc<dyn RemoteCollection<Chat>>,
    pub messages: Arc<dyn RemoteCollection<ChatMessage>>,
}

impl Remotes {
    /// Use one value that serves every collection.
    pub fn shared<R>(remote: Arc<R>) -> Self
    where
        R: RemoteCollection<Connection>
            + RemoteCollection<SavedQuery>
            + RemoteCollection<Chat>
            + RemoteCollection<ChatMessage>
            + 'static,
    {
        Self {
            connections: remote.clone(),
            queries: remote.clone(),
            chats: remote.clone(),
            messages: remote,
        }
    }
}

/// Local-first client: reads and writes hit the local store, sync passes
/// converge it with the server.
pub struct TetherClient {
    store: LocalStore,
    signals: SyncSignals,
    connections: Arc<CollectionSync<Connection>>,
    queries: Arc<CollectionSync<SavedQuery>>,
    chats: Arc<CollectionSync<Chat>>,
    messages: Arc<CollectionSync<ChatMessage>>,
    supervisor: SyncSupervisor,
}

impl TetherClient {
    /// Open the store at `db_path` and talk HTTP to the configured API.
    pub async fn open(config: &ClientConfig, db_path: impl Into<PathBuf>) -> Result<Self> {
        let signals = SyncSignals::with_credentials(config.access_token.clone());
        let remotes = match config.api_base_url.as_deref() {
            Some(base_url) => Remotes::shared(Arc::new(HttpRemote::new(
                base_url,
                config.http_timeout,
                signals.clone(),
            )?)),
            None => Remotes::shared(Arc::new(Unconfigured)),
        };

        let prepared = Gate::closed();
        let store = LocalStore::open_path(db_path).await?;
        prepared.open();
        Ok(Self::assemble(store, signals, remotes, prepared))
    }

    /// Build a client over an existing store (already migrated).
    pub fn with_remotes(store: LocalStore, signals: SyncSignals, remotes: Remotes) -> Self {
        Self::assemble(store, signals, remotes, Gate::opened())
    }

    fn assemble(store: LocalStore, signals: SyncSignals, remotes: Remotes, prepared: Gate) -> Self {
        let notices = SyncSupervisor::notice_channel();
        let parts = Parts {
            store: &store,
            signals: &signals,
            prepared: &prepared,
            notices: &notices,
        };

        let connections = Arc::new(parts.sync(remotes.connections));
        let queries = Arc::new(parts.sync(remotes.queries).after(connections.settled()));
        let chats = Arc::new(parts.sync(remotes.chats).after(connections.settled()));
        let messages = Arc::new(parts.sync(remotes.messages).after(chats.settled()));

        let passes: Vec<Arc<dyn CollectionPass>> = vec![
            connections.clone(),
            queries.clone(),
            chats.clone(),
            messages.clone(),
        ];
        let supervisor = SyncSupervisor::new(passes, notices);

        Self {
            store,
            signals,
            connections,
            queries,
            chats,
            messages,
            supervisor,
        }
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    pub const fn signals(&self) -> &SyncSignals {
        &self.signals
    }

    pub fn connections(&self) -> &Collection<Connection> {
        self.connections.collection()
    }

    pub fn queries(&self) -> &Collection<SavedQuery> {
        self.queries.collection()
    }

    pub fn chats(&self) -> &Collection<Chat> {
        self.chats.collection()
    }

    pub fn messages(&self) -> &Collection<ChatMessage> {
        self.messages.collection()
    }

    /// Messages of one chat, oldest first.
    pub async fn chat_messages(&self, chat_id: RecordId) -> Result<Vec<ChatMessage>> {
        self.messages().list_by("chat_id", chat_id).await
    }

    /// Saved queries for one connection.
    pub async fn connection_queries(&self, connection_id: RecordId) -> Result<Vec<SavedQuery>> {
        self.queries().list_by("connection_id", connection_id).await
    }

    pub async fn sync_all(&self, trigger: SyncTrigger) -> Vec<(EntityKind, Result<PassOutcome>)> {
        self.supervisor.sync_all(trigger).await
    }

    pub async fn sync_collection(
        &self,
        kind: EntityKind,
        trigger: SyncTrigger,
    ) -> Result<PassOutcome> {
        self.supervisor.sync_collection(kind, trigger).await
    }

    pub const fn supervisor(&self) -> &SyncSupervisor {
        &self.supervisor
    }

    pub fn phases(&self) -> Vec<(EntityKind, SyncPhase)> {
        self.supervisor.phases()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.supervisor.subscribe_notices()
    }

    /// Record counts per collection.
    pub async fn counts(&self) -> Result<Vec<(EntityKind, u64)>> {
        Ok(vec![
            (EntityKind::Connections, self.connections().count().await?),
            (EntityKind::Queries, self.queries().count().await?),
            (EntityKind::Chats, self.chats().count().await?),
            (EntityKind::ChatMessages, self.messages().count().await?),
        ])
    }
}

/// Shared pieces every collection's state machine is built from.
struct Parts<'a> {
    store: &'a LocalStore,
    signals: &'a SyncSignals,
    prepared: &'a Gate,
    notices: &'a broadcast::Sender<SyncNotice>,
}

impl Parts<'_> {
    fn sync<T: TableRecord>(&self, remote: Arc<dyn RemoteCollection<T>>) -> CollectionSync<T> {
        CollectionSync::new(
            Collection::new(self.store.clone(), remote),
            self.signals.clone(),
            self.prepared.clone(),
            self.notices.clone(),
        )
    }
}

/// Stand-in used when no API base URL is configured.
struct Unconfigured;

impl Unconfigured {
    fn error() -> RemoteError {
        RemoteError::InvalidConfiguration("TETHER_API_BASE_URL is not set".to_string())
    }
}

#[async_trait]
impl<T: SyncableRecord> RemoteCollection<T> for Unconfigured {
    async fn reconcile(&self, _snapshot: &[SnapshotEntry]) -> RemoteResult<Vec<SyncOp<T>>> {
        Err(Self::error())
    }

    async fn create(&self, _record: &T) -> RemoteResult<()> {
        Err(Self::error())
    }

    async fn update(&self, _record: &T) -> RemoteResult<()> {
        Err(Self::error())
    }

    async fn remove(&self, _ids: &[RecordId]) -> RemoteResult<()> {
        Err(Self::error())
    }
}
