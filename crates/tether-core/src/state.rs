//! Shared sync state types.

use serde::Serialize;

/// Phase of one collection's sync state machine.
///
/// `Idle -> Fetching -> Applying -> Idle`, or `-> Error` on failure. `Error`
/// stays visible until the next trigger starts a fresh pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Fetching,
    Applying,
    Error,
}

impl SyncPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Applying => "applying",
            Self::Error => "error",
        }
    }

    /// Whether a pass is currently in flight.
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Fetching | Self::Applying)
    }
}

/// What caused a sync pass to start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncTrigger {
    AppStart,
    Reconnect,
    Foreground,
    Navigation,
    Manual,
}

impl SyncTrigger {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AppStart => "app_start",
            Self::Reconnect => "reconnect",
            Self::Foreground => "foreground",
            Self::Navigation => "navigation",
            Self::Manual => "manual",
        }
    }
}
