use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub session_jwt_secret: String,
    pub session_jwt_issuer: String,
    pub auth_clock_skew: Duration,
    pub sync_grace: TimeDelta,
    pub rate_limit_window: Duration,
    pub sync_rate_limit_per_window: u32,
    pub mutation_rate_limit_per_window: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("session_jwt_secret", &"[REDACTED]")
            .field("session_jwt_issuer", &self.session_jwt_issuer)
            .field("auth_clock_skew", &self.auth_clock_skew)
            .field("sync_grace_ms", &self.sync_grace.num_milliseconds())
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "sync_rate_limit_per_window",
                &self.sync_rate_limit_per_window,
            )
            .field(
                "mutation_rate_limit_per_window",
                &self.mutation_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TETHER_API_BIND_ADDR", "127.0.0.1:8080");
        let database_path = PathBuf::from(value_or_default(
            &lookup,
            "TETHER_API_DATABASE_PATH",
            "tether-api.db",
        ));

        let session_jwt_secret = required_trimmed(&lookup, "TETHER_SESSION_JWT_SECRET")?;
        if session_jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "TETHER_SESSION_JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }
        let session_jwt_issuer = value_or_default(&lookup, "TETHER_SESSION_JWT_ISSUER", "tether");

        let auth_clock_skew_secs = parse_in_range(&lookup, "AUTH_CLOCK_SKEW_SECS", 60, 0, 300)?;
        let sync_grace_ms = parse_in_range(&lookup, "TETHER_SYNC_GRACE_MS", 1_000, 0, 60_000)?;
        let rate_limit_window_secs =
            parse_in_range(&lookup, "RATE_LIMIT_WINDOW_SECS", 60, 10, 3_600)?;
        let sync_rate_limit_per_window =
            parse_in_range(&lookup, "SYNC_RATE_LIMIT_PER_WINDOW", 120, 1, 5_000)?;
        let mutation_rate_limit_per_window =
            parse_in_range(&lookup, "MUTATION_RATE_LIMIT_PER_WINDOW", 600, 1, 10_000)?;

        Ok(Self {
            bind_addr,
            database_path,
            session_jwt_secret,
            session_jwt_issuer,
            auth_clock_skew: Duration::from_secs(auth_clock_skew_secs),
            sync_grace: TimeDelta::milliseconds(i64::try_from(sync_grace_ms).unwrap_or(1_000)),
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_rate_limit_per_window: u32::try_from(sync_rate_limit_per_window)
                .unwrap_or(u32::MAX),
            mutation_rate_limit_per_window: u32::try_from(mutation_rate_limit_per_window)
                .unwrap_or(u32::MAX),
        })
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = match optional_trimmed(lookup, name) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
        })?,
        None => default,
    };
    if !(min..=max).contains(&value) {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn required_trimmed(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    optional_trimmed(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        database_path: PathBuf::from(":memory:"),
        session_jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        session_jwt_issuer: "tether".to_string(),
        auth_clock_skew: Duration::from_secs(60),
        sync_grace: TimeDelta::seconds(1),
        rate_limit_window: Duration::from_secs(60),
        sync_rate_limit_per_window: 100,
        mutation_rate_limit_per_window: 100,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn from_map(map: &HashMap<&str, &str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_requires_session_secret() {
        let err = from_map(&HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("TETHER_SESSION_JWT_SECRET"));
    }

    #[test]
    fn config_applies_defaults() {
        let mut map = HashMap::new();
        map.insert(
            "TETHER_SESSION_JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        );

        let config = from_map(&map).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.session_jwt_issuer, "tether");
        assert_eq!(config.sync_grace, TimeDelta::seconds(1));
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
    }

    #[test]
    fn config_rejects_out_of_range_grace() {
        let mut map = HashMap::new();
        map.insert(
            "TETHER_SESSION_JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        );
        map.insert("TETHER_SYNC_GRACE_MS", "120000");
        let err = from_map(&map).unwrap_err();
        assert!(err.to_string().contains("TETHER_SYNC_GRACE_MS"));

        map.insert("TETHER_SYNC_GRACE_MS", "250");
        let config = from_map(&map).unwrap();
        assert_eq!(config.sync_grace, TimeDelta::milliseconds(250));
    }

    #[test]
    fn config_rejects_short_secret() {
        let mut map = HashMap::new();
        map.insert("TETHER_SESSION_JWT_SECRET", "short");
        assert!(from_map(&map).is_err());
    }

    #[test]
    fn config_redacts_sensitive_debug_fields() {
        let mut map = HashMap::new();
        map.insert(
            "TETHER_SESSION_JWT_SECRET",
            "sensitive-session-secret-0123456789",
        );

        let config = from_map(&map).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-session-secret"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
