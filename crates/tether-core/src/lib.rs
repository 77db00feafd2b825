//! tether-core - Core library for tether
//!
//! Local-first record sync: the shared models and wire protocol, the
//! reconciliation algorithm used by the API server, and the client-side
//! store, collections and sync orchestration used by every front end.

pub mod client;
pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod protocol;
pub mod state;
pub mod sync;
pub mod util;

pub use client::{Remotes, TetherClient};
pub use error::{Error, Result};
pub use models::{EntityKind, RecordId, SyncableRecord};
