use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tether_core::util::user_fingerprint;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::AppError;

/// Windows are pruned once the table grows past this many entries.
const PRUNE_THRESHOLD: usize = 4_096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtectedEndpoint {
    /// `POST /v1/sync/{entity}`
    Sync,
    /// Create, update and remove calls.
    Mutation,
}

impl ProtectedEndpoint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Mutation => "mutation",
        }
    }
}

/// Fixed-window request limiter keyed by endpoint and user.
#[derive(Clone)]
pub struct EndpointRateLimiter {
    windows: Arc<Mutex<HashMap<(ProtectedEndpoint, u64), RateWindow>>>,
    window: Duration,
    sync: Arc<EndpointBudget>,
    mutation: Arc<EndpointBudget>,
}

struct EndpointBudget {
    limit: u32,
    allowed: AtomicU64,
    limited: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateLimitMetricsSnapshot {
    pub sync: EndpointMetrics,
    pub mutation: EndpointMetrics,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EndpointMetrics {
    pub allowed: u64,
    pub limited: u64,
}

impl EndpointRateLimiter {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.rate_limit_window,
            config.sync_rate_limit_per_window,
            config.mutation_rate_limit_per_window,
        )
    }

    fn new(window: Duration, sync_limit: u32, mutation_limit: u32) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            window,
            sync: Arc::new(EndpointBudget::new(sync_limit)),
            mutation: Arc::new(EndpointBudget::new(mutation_limit)),
        }
    }

    pub async fn check(&self, endpoint: ProtectedEndpoint, user_id: &str) -> Result<(), AppError> {
        let budget = self.budget(endpoint);
        let user = user_fingerprint(user_id);
        let now = Instant::now();

        let mut windows = self.windows.lock().await;
        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started_at) < self.window);
        }

        let window = windows.entry((endpoint, user)).or_insert(RateWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(window.started_at) >= self.window {
            *window = RateWindow {
                started_at: now,
                count: 0,
            };
        }

        if window.count >= budget.limit {
            let retry_after_secs = self
                .window
                .saturating_sub(now.duration_since(window.started_at))
                .as_secs()
                .max(1);
            budget.limited.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                endpoint = endpoint.label(),
                user,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Err(AppError::too_many_requests(
                format!("Too many {} requests", endpoint.label()),
                retry_after_secs,
            ));
        }

        window.count += 1;
        budget.allowed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn metrics_snapshot(&self) -> RateLimitMetricsSnapshot {
        RateLimitMetricsSnapshot {
            sync: self.sync.metrics(),
            mutation: self.mutation.metrics(),
        }
    }

    fn budget(&self, endpoint: ProtectedEndpoint) -> &EndpointBudget {
        match endpoint {
            ProtectedEndpoint::Sync => &self.sync,
            ProtectedEndpoint::Mutation => &self.mutation,
        }
    }
}

impl EndpointBudget {
    const fn new(limit: u32) -> Self {
        Self {
            limit,
            allowed: AtomicU64::new(0),
            limited: AtomicU64::new(0),
        }
    }

    fn metrics(&self) -> EndpointMetrics {
        EndpointMetrics {
            allowed: self.allowed.load(Ordering::Relaxed),
            limited: self.limited.load(Ordering::Relaxed),
        }
    }
}
