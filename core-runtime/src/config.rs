//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every host capability the controller drives. It
//! enforces fail-fast validation so a missing bridge is reported at startup
//! rather than on the first command.
//!
//! ## Required Dependencies
//!
//! - `MediaEngineFactory` - Opens one native engine per session
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `AudioSessionControl` - Shared output category (desktop default: `DesktopAudioSession`)
//! - `NowPlayingCenter` - Lock screen / media keys (desktop default: `DesktopNowPlaying`)
//! - `HeadlessRunner` - Background execution context (no desktop default)
//!
//! When the `desktop-shims` feature is enabled, the desktop defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .engine_factory(Arc::new(MyEngineFactory))
//!     .enable_remote_controls(true)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No engine factory: fails with Error::CapabilityMissing
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing engine factory");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioSessionControl, HeadlessRunner, MediaEngineFactory, NowPlayingCenter};
use std::sync::Arc;

/// Upper bound for the outbound event buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 100_000;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Opens engines for sessions (required)
    pub engine_factory: Arc<dyn MediaEngineFactory>,

    /// Shared output session (required, desktop default)
    pub audio_session: Arc<dyn AudioSessionControl>,

    /// Remote-control surface (optional, desktop default)
    pub now_playing: Option<Arc<dyn NowPlayingCenter>>,

    /// Headless context bootstrap (optional)
    pub headless_runner: Option<Arc<dyn HeadlessRunner>>,

    /// Features flags
    pub features: FeatureFlags,

    /// Per-subscriber buffer of the outbound event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine_factory", &"MediaEngineFactory { ... }")
            .field("audio_session", &"AudioSessionControl { ... }")
            .field(
                "now_playing",
                &self
                    .now_playing
                    .as_ref()
                    .map(|_| "NowPlayingCenter { ... }"),
            )
            .field(
                "headless_runner",
                &self
                    .headless_runner
                    .as_ref()
                    .map(|_| "HeadlessRunner { ... }"),
            )
            .field("features", &self.features)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Each flag requires the matching bridge to be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Route lock screen / media key presses to the last active session
    /// (requires NowPlayingCenter)
    pub enable_remote_controls: bool,

    /// Allow `startHeadlessService` and background events
    /// (requires HeadlessRunner)
    pub enable_headless: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_remote_controls: true,
            enable_headless: false,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Event buffer size is reasonable (> 0 and <= 100,000)
    /// - Feature flags are consistent with available bridges
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.features.enable_remote_controls && self.now_playing.is_none() {
            return Err(Error::Config(
                "Remote controls enabled but no NowPlayingCenter provided. \
                 Disable the feature or inject a NowPlayingCenter implementation."
                    .to_string(),
            ));
        }

        if self.features.enable_headless && self.headless_runner.is_none() {
            return Err(Error::Config(
                "Headless service enabled but no HeadlessRunner provided. \
                 Disable the feature or inject a HeadlessRunner implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Headless runner if the feature is enabled.
    pub fn active_headless_runner(&self) -> Option<Arc<dyn HeadlessRunner>> {
        self.features
            .enable_headless
            .then(|| self.headless_runner.clone())
            .flatten()
    }
}

fn engine_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaEngineFactory".to_string(),
        message: "MediaEngineFactory implementation is required to open playback engines. \
                 Desktop: inject a decoder-backed engine. \
                 Mobile: inject the platform player (AVPlayer/ExoPlayer)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_audio_session() -> Result<Arc<dyn AudioSessionControl>> {
    use bridge_desktop::DesktopAudioSession;

    let session: Arc<dyn AudioSessionControl> = Arc::new(DesktopAudioSession::new());
    Ok(session)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_audio_session() -> Result<Arc<dyn AudioSessionControl>> {
    Err(Error::CapabilityMissing {
        capability: "AudioSessionControl".to_string(),
        message: "AudioSessionControl implementation is required to manage the shared output. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default DesktopAudioSession. \
                 Mobile: inject the platform audio session (AVAudioSession/AudioManager)."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_now_playing() -> Option<Arc<dyn NowPlayingCenter>> {
    use bridge_desktop::DesktopNowPlaying;

    let center: Arc<dyn NowPlayingCenter> = Arc::new(DesktopNowPlaying::new());
    Some(center)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_now_playing() -> Option<Arc<dyn NowPlayingCenter>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    engine_factory: Option<Arc<dyn MediaEngineFactory>>,
    audio_session: Option<Arc<dyn AudioSessionControl>>,
    now_playing: Option<Arc<dyn NowPlayingCenter>>,
    headless_runner: Option<Arc<dyn HeadlessRunner>>,
    features: FeatureFlags,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the engine factory (required).
    pub fn engine_factory(mut self, factory: Arc<dyn MediaEngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    /// Sets the shared output session.
    ///
    /// If not provided, `DesktopAudioSession` is used when the
    /// `desktop-shims` feature is enabled.
    pub fn audio_session(mut self, session: Arc<dyn AudioSessionControl>) -> Self {
        self.audio_session = Some(session);
        self
    }

    /// Sets the remote-control surface.
    ///
    /// If not provided, `DesktopNowPlaying` is used when the `desktop-shims`
    /// feature is enabled; otherwise `setNotification` reports "not
    /// implemented".
    pub fn now_playing(mut self, center: Arc<dyn NowPlayingCenter>) -> Self {
        self.now_playing = Some(center);
        self
    }

    /// Sets the headless context bootstrap (optional).
    pub fn headless_runner(mut self, runner: Arc<dyn HeadlessRunner>) -> Self {
        self.headless_runner = Some(runner);
        self
    }

    /// Default: true
    pub fn enable_remote_controls(mut self, enabled: bool) -> Self {
        self.features.enable_remote_controls = enabled;
        self
    }

    /// Requires a `HeadlessRunner` to be provided.
    ///
    /// Default: false
    pub fn enable_headless(mut self, enabled: bool) -> Self {
        self.features.enable_headless = enabled;
        self
    }

    /// Default: 1000 events
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - Required bridges are missing (MediaEngineFactory, AudioSessionControl)
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let engine_factory = self
            .engine_factory
            .ok_or_else(engine_factory_missing_error)?;

        let audio_session = match self.audio_session {
            Some(session) => session,
            None => provide_default_audio_session()?,
        };

        let now_playing = self.now_playing.or_else(provide_default_now_playing);

        let config = CoreConfig {
            engine_factory,
            audio_session,
            now_playing,
            headless_runner: self.headless_runner,
            features: self.features,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
