//! Credentials and connectivity inputs consumed by sync passes.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared handle to the current access token and online state.
///
/// Cloning shares the same underlying channels.
#[derive(Clone)]
pub struct SyncSignals {
    credentials: Arc<watch::Sender<Option<String>>>,
    online: Arc<watch::Sender<bool>>,
}

impl std::fmt::Debug for SyncSignals {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncSignals")
            .field(
                "credentials",
                &self.credentials.borrow().as_ref().map(|_| "[REDACTED]"),
            )
            .field("online", &*self.online.borrow())
            .finish()
    }
}

impl Default for SyncSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSignals {
    /// No credentials, online.
    pub fn new() -> Self {
        Self {
            credentials: Arc::new(watch::channel(None).0),
            online: Arc::new(watch::channel(true).0),
        }
    }

    pub fn with_credentials(token: Option<String>) -> Self {
        let signals = Self::new();
        signals.set_credentials(token);
        signals
    }

    pub fn set_credentials(&self, token: Option<String>) {
        let token = crate::util::normalize_text_option(token);
        self.credentials.send_replace(token);
    }

    pub fn credentials(&self) -> Option<String> {
        self.credentials.borrow().clone()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.borrow().is_some()
    }

    pub fn set_online(&self, online: bool) {
        let was_online = self.online.send_replace(online);
        if was_online != online {
            tracing::debug!(online, "Connectivity changed");
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Watch connectivity, e.g. to trigger a pass on reconnect.
    pub fn subscribe_online(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_counts_as_missing() {
        let signals = SyncSignals::with_credentials(Some("  ".to_string()));
        assert!(!signals.has_credentials());
        signals.set_credentials(Some("token".to_string()));
        assert_eq!(signals.credentials().as_deref(), Some("token"));
    }

    #[test]
    fn clones_share_state() {
        let signals = SyncSignals::new();
        let clone = signals.clone();
        clone.set_online(false);
        assert!(!signals.is_online());
    }

    #[test]
    fn debug_redacts_token() {
        let signals = SyncSignals::with_credentials(Some("secret-token".to_string()));
        let rendered = format!("{signals:?}");
        assert!(!rendered.contains("secret-token"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn online_subscribers_see_changes() {
        let signals = SyncSignals::new();
        let mut online = signals.subscribe_online();
        signals.set_online(false);
        online.changed().await.unwrap();
        assert!(!*online.borrow());
    }
}
