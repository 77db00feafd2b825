//! HTTP client for the sync API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::SyncSignals;
use crate::models::{EntityKind, RecordId, SyncableRecord};
use crate::protocol::{RemoveRequest, SnapshotEntry, SyncOp};
use crate::util::{compact_text, is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid sync API configuration: {0}")]
    InvalidConfiguration(String),
    #[error("No access token is available")]
    MissingCredentials,
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync API rejected the access token: {0}")]
    Unauthorized(String),
    #[error("Sync API resource not found: {0}")]
    NotFound(String),
    #[error("Sync API error: {0}")]
    Api(String),
    #[error("Invalid sync payload: {0}")]
    InvalidPayload(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Server-side counterpart of one collection.
#[async_trait]
pub trait RemoteCollection<T: SyncableRecord>: Send + Sync {
    /// Exchange a snapshot for the ops that converge it.
    async fn reconcile(&self, snapshot: &[SnapshotEntry]) -> RemoteResult<Vec<SyncOp<T>>>;

    async fn create(&self, record: &T) -> RemoteResult<()>;

    async fn update(&self, record: &T) -> RemoteResult<()>;

    async fn remove(&self, ids: &[RecordId]) -> RemoteResult<()>;
}

/// Talks to the `/v1` API with the current bearer token.
#[derive(Clone)]
pub struct HttpRemote {
    endpoint: String,
    client: reqwest::Client,
    signals: SyncSignals,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemote")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        signals: SyncSignals,
    ) -> RemoteResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::builder().timeout(timeout).build()?,
            signals,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, kind: EntityKind, suffix: &str) -> String {
        format!("{}/v1/{}{suffix}", self.endpoint, kind.as_str())
    }

    fn token(&self) -> RemoteResult<String> {
        self.signals
            .credentials()
            .ok_or(RemoteError::MissingCredentials)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = request
            .bearer_auth(self.token()?)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = parse_api_error(status, &body);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(message),
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            _ => RemoteError::Api(message),
        })
    }
}

#[async_trait]
impl<T: SyncableRecord> RemoteCollection<T> for HttpRemote {
    async fn reconcile(&self, snapshot: &[SnapshotEntry]) -> RemoteResult<Vec<SyncOp<T>>> {
        let url = format!("{}/v1/sync/{}", self.endpoint, T::KIND.as_str());
        let response = self.send(self.client.post(url).json(snapshot)).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|error| {
            RemoteError::InvalidPayload(format!("{} ops: {error}", T::KIND))
        })
    }

    async fn create(&self, record: &T) -> RemoteResult<()> {
        let request = self.client.post(self.url(T::KIND, "")).json(record);
        self.send(request).await?;
        Ok(())
    }

    async fn update(&self, record: &T) -> RemoteResult<()> {
        let suffix = format!("/{}", record.id());
        let request = self.client.put(self.url(T::KIND, &suffix)).json(record);
        self.send(request).await?;
        Ok(())
    }

    async fn remove(&self, ids: &[RecordId]) -> RemoteResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = RemoveRequest { ids: ids.to_vec() };
        let request = self.client.post(self.url(T::KIND, "/remove")).json(&body);
        self.send(request).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

pub fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
