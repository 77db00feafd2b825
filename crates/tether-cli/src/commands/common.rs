use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tether_core::collection::{Collection, Mutation, Write};
use tether_core::config::ClientConfig;
use tether_core::db::TableRecord;
use tether_core::models::RecordId;
use tether_core::TetherClient;

use crate::error::CliError;

/// An opened local store plus the configuration it was opened with.
pub struct App {
    pub client: TetherClient,
    pub config: ClientConfig,
    pub db_path: PathBuf,
}

impl App {
    pub async fn open(cli_db_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = ClientConfig::from_env()?;
        Self::open_with(config, cli_db_path).await
    }

    pub async fn open_with(
        config: ClientConfig,
        cli_db_path: Option<PathBuf>,
    ) -> Result<Self, CliError> {
        let db_path = resolve_db_path(cli_db_path, &config);
        let client = TetherClient::open(&config, db_path.clone()).await?;
        Ok(Self {
            client,
            config,
            db_path,
        })
    }

    pub const fn sync_configured(&self) -> bool {
        self.config.is_sync_configured()
    }

    /// Commit a local change. It is mirrored to the server only when sync
    /// is configured; a failed mirror leaves the local change in place.
    pub async fn write<T: TableRecord>(
        &self,
        collection: &Collection<T>,
        mutation: Mutation<T>,
    ) -> Result<(), CliError> {
        let write = if self.sync_configured() {
            Write::Local(mutation)
        } else {
            Write::LocalOnly(mutation)
        };

        match collection.write(write).await {
            Ok(_) => Ok(()),
            Err(error @ tether_core::Error::Mirror { .. }) => {
                tracing::warn!(entity = %T::KIND, "Mirror failed: {error}");
                eprintln!("Warning: {error}");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Find a record by full id or unique id prefix.
pub async fn resolve_record<T: TableRecord>(
    collection: &Collection<T>,
    query: &str,
) -> Result<T, CliError> {
    let query = normalize_identifier(query)?;

    if let Ok(id) = query.parse::<RecordId>() {
        if let Some(record) = collection.get(id).await? {
            return Ok(record);
        }
    }

    let prefix = query.to_ascii_lowercase();
    let mut matching = collection
        .list()
        .await?
        .into_iter()
        .filter(|record| record.id().as_str().starts_with(&prefix))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::RecordNotFound(T::KIND, query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|record| short_id(record.id()))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn normalize_identifier(id: &str) -> Result<String, CliError> {
    let normalized = id.trim();
    if normalized.is_empty() {
        Err(CliError::EmptyId)
    } else {
        Ok(normalized.to_string())
    }
}

pub fn short_id(id: RecordId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn relative_time(timestamp: DateTime<Utc>) -> String {
    format_relative_time(timestamp.timestamp_millis(), Utc::now().timestamp_millis())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &ClientConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.db_path.clone())
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
        .join("tether.db")
}

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
