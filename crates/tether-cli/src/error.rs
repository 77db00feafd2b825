use std::io;

use tether_core::config::ConfigError;
use tether_core::models::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tether_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record ID cannot be empty")]
    EmptyId,
    #[error("Query text cannot be empty")]
    EmptyQuery,
    #[error("No {0} found for id/prefix: {1}")]
    RecordNotFound(EntityKind, String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error(
        "Sync is not configured. Set TETHER_API_BASE_URL and TETHER_ACCESS_TOKEN (a token from `tether-api issue-token`)."
    )]
    SyncNotConfigured,
    #[error("{0} collection(s) failed to sync")]
    SyncFailed(usize),
}
