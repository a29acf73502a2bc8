//! Media engine bridge traits and supporting types.
//!
//! These abstractions let the playback controller drive one native
//! decode/render engine per session without knowing which platform engine
//! sits underneath. Control calls are non-blocking requests; everything the
//! engine learns later (readiness, duration, seek completion, end of stream)
//! is reported through registered [`EngineObserver`]s, which may be invoked
//! from any thread.

use crate::{error::Result, platform::PlatformSendSync};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where an engine should read its audio from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    /// URL or filesystem path, exactly as supplied by the caller.
    pub url: String,
    /// `true` when `url` names a local file rather than a remote stream.
    pub is_local: bool,
}

impl MediaSource {
    pub fn new(url: impl Into<String>, is_local: bool) -> Self {
        Self {
            url: url.into(),
            is_local,
        }
    }

    /// Local file path with any `file://` scheme removed.
    pub fn local_path(&self) -> Option<&str> {
        if !self.is_local {
            return None;
        }
        Some(self.url.strip_prefix("file://").unwrap_or(&self.url))
    }
}

/// Readiness of an engine's current item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EngineStatus {
    /// Still opening or buffering.
    #[default]
    Unknown,
    /// Enough is known about the item to start playback.
    ReadyToPlay,
    /// The item cannot be played.
    Failed(String),
}

/// Asynchronous notification emitted by an engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineNotification {
    StatusChanged(EngineStatus),
    DurationChanged(Duration),
    /// A previously requested seek finished. `finished` is `false` when the
    /// seek was interrupted (for example by another seek).
    SeekCompleted { finished: bool },
    /// The item played through to its end.
    PlaybackEnded,
}

/// Callback invoked for every engine notification.
pub type EngineObserver = Arc<dyn Fn(EngineNotification) + Send + Sync>;

/// Handle returned when registering an observer, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

impl fmt::Display for ObserverToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// One native engine instance bound to a single source.
///
/// Implementations must stop invoking an observer once
/// [`remove_observer`](MediaEngine::remove_observer) has returned for its
/// token.
pub trait MediaEngine: PlatformSendSync {
    /// Start or continue playback at the current rate.
    fn play(&self) -> Result<()>;

    /// Pause without discarding the item.
    fn pause(&self) -> Result<()>;

    /// Request a seek to an absolute position. Completion is reported via
    /// [`EngineNotification::SeekCompleted`].
    fn seek(&self, position: Duration) -> Result<()>;

    /// Volume normalized to `0.0..=1.0`.
    fn set_volume(&self, volume: f32) -> Result<()>;

    /// Playback rate; `1.0` is normal speed.
    fn set_rate(&self, rate: f32) -> Result<()>;

    /// Item duration once known.
    fn duration(&self) -> Option<Duration>;

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Current item status.
    fn status(&self) -> EngineStatus;

    /// Register an observer for status/duration/seek/end notifications.
    fn add_observer(&self, observer: EngineObserver) -> ObserverToken;

    /// Unregister a previously added observer.
    fn remove_observer(&self, token: ObserverToken) -> Result<()>;
}

/// Opens engine instances for media sources.
pub trait MediaEngineFactory: PlatformSendSync {
    /// Construct an engine bound to `source`. Opening is expected to be
    /// quick; loading continues in the background and readiness is reported
    /// through the engine's observers.
    fn open(&self, source: &MediaSource) -> Result<Arc<dyn MediaEngine>>;
}
