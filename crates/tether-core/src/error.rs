//! Error types for tether-core

use thiserror::Error;

use crate::models::EntityKind;
use crate::sync::RemoteError;

/// Result type alias using tether-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tether-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The reconcile call or another remote request failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The local write committed but mirroring it to the server failed
    #[error("Saved locally, but the {entity} change could not be sent to the server: {source}")]
    Mirror {
        entity: EntityKind,
        #[source]
        source: RemoteError,
    },

    /// The parent collection's latest pass did not settle cleanly
    #[error("Cannot sync {child}: the {parent} sync did not complete")]
    ParentSyncFailed {
        parent: EntityKind,
        child: EntityKind,
    },

    /// A trigger joined a running pass and that pass failed
    #[error("{entity} sync failed: {message}")]
    JoinedPassFailed { entity: EntityKind, message: String },
}
