//! Client configuration.
//!
//! Read from the environment by the CLI and by any other front end that
//! embeds the sync engine.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the sync API, without the `/v1` suffix.
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    /// Local database file; front ends pick a platform default when unset.
    pub db_path: Option<PathBuf>,
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            access_token: None,
            db_path: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ClientConfig")
            .field("api_base_url", &self.api_base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_path", &self.db_path)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_base_url = normalize_text_option(lookup("TETHER_API_BASE_URL"))
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = api_base_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "TETHER_API_BASE_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let access_token = normalize_text_option(lookup("TETHER_ACCESS_TOKEN"));
        let db_path = normalize_text_option(lookup("TETHER_DB_PATH")).map(PathBuf::from);

        let http_timeout_secs = match normalize_text_option(lookup("TETHER_HTTP_TIMEOUT_SECS")) {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::Invalid(
                    "TETHER_HTTP_TIMEOUT_SECS must be an integer in [1, 300]".to_string(),
                )
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        if !(1..=300).contains(&http_timeout_secs) {
            return Err(ConfigError::Invalid(
                "TETHER_HTTP_TIMEOUT_SECS must be in [1, 300]".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            access_token,
            db_path,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }

    /// Whether enough is configured to reach the server.
    pub const fn is_sync_configured(&self) -> bool {
        self.api_base_url.is_some() && self.access_token.is_some()
    }
}
