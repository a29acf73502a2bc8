//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host platform implements for the
//! playback controller.
//!
//! ## Overview
//!
//! This crate defines the contract between the controller and the native
//! side. Each trait is a capability the controller needs but that must be
//! implemented differently per platform (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaEngineFactory`](playback::MediaEngineFactory) /
//!   [`MediaEngine`](playback::MediaEngine) - One native decode/render engine per session
//!
//! ### Shared Output
//! - [`AudioSessionControl`](audio_session::AudioSessionControl) - Output category and activation
//!
//! ### Platform Integration
//! - [`NowPlayingCenter`](now_playing::NowPlayingCenter) - Lock screen metadata and remote buttons
//! - [`HeadlessRunner`](background::HeadlessRunner) - Background execution bootstrap
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Capability | Desktop (`bridge-desktop`) | Mobile |
//! |------------|----------------------------|--------|
//! | MediaEngineFactory | host supplied | host supplied |
//! | AudioSessionControl | `DesktopAudioSession` | host supplied |
//! | NowPlayingCenter | `DesktopNowPlaying` | host supplied |
//! | HeadlessRunner | not available | host supplied |
//!
//! ## Error Handling
//!
//! All bridge traits report failures with [`BridgeError`](error::BridgeError).
//! The controller decides per call site whether an error is surfaced to the
//! caller (engine open failures) or logged and swallowed (audio session
//! rejections).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; observers and command handlers
//! may be invoked from host threads.

pub mod audio_session;
pub mod background;
pub mod error;
pub mod logging;
pub mod now_playing;
pub mod platform;
pub mod playback;

pub use error::BridgeError;

// Re-export commonly used types
pub use audio_session::{AudioSessionControl, CategoryOptions, OutputCategory};
pub use background::HeadlessRunner;
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use now_playing::{
    NowPlayingCenter, NowPlayingInfo, RemoteCommand, RemoteCommandConfig, RemoteCommandHandler,
};
pub use playback::{
    EngineNotification, EngineObserver, EngineStatus, MediaEngine, MediaEngineFactory,
    MediaSource, ObserverToken,
};
