//! Data models for tether

mod chat;
mod connection;
mod entity;
mod id;
mod query;

pub use chat::{Chat, ChatMessage, MessageRole};
pub use connection::{
    connection_password, replace_password, strip_password, Connection, DatabaseKind, SyncType,
};
pub use entity::{EntityKind, SyncableRecord};
pub use id::RecordId;
pub use query::SavedQuery;
