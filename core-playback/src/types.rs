//! Session identifiers and per-session state enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Caller-supplied key of a playback session.
///
/// Opaque to the controller; the same literal may be reused after release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    /// No source loaded.
    #[default]
    Idle,
    /// Engine opened, waiting for readiness.
    Loading,
    /// Loaded and not yet started.
    Ready,
    Playing,
    Paused,
    /// Halted at the stream start.
    Stopped,
    /// Engine failed; no retry until a new source is set.
    Failed,
}

/// Preferred output route of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayingRoute {
    #[default]
    Speakers,
    Earpiece,
}

impl PlayingRoute {
    /// `"earpiece"` selects the earpiece; anything else the speakers.
    pub fn from_arg(value: &str) -> Self {
        if value == "earpiece" {
            PlayingRoute::Earpiece
        } else {
            PlayingRoute::Speakers
        }
    }
}

/// Point-in-time view of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub status: PlayerStatus,
    /// Engine observers plus the position ticker, if running.
    pub registrations: usize,
}

/// Point-in-time view of the controller, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ControllerSnapshot {
    /// Sessions ordered by id.
    pub sessions: Vec<SessionSnapshot>,
    pub output_active: bool,
    pub last_active: Option<SessionId>,
}

impl ControllerSnapshot {
    pub fn session(&self, id: &str) -> Option<&SessionSnapshot> {
        self.sessions.iter().find(|session| session.id.as_str() == id)
    }
}

/// Whole milliseconds, saturating.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
