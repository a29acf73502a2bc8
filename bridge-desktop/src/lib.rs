//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `AudioSessionControl` as [`DesktopAudioSession`]: desktop mixers need no
//!   category negotiation, so requests are recorded and always accepted
//! - `NowPlayingCenter` as [`DesktopNowPlaying`]: in-memory metadata plus a
//!   `press` entry point for media keys
//!
//! Desktop has no headless execution context; hosts leave
//! `HeadlessRunner` unset and the headless commands report "not implemented".
//! The media engine is always host supplied.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopAudioSession, DesktopNowPlaying};
//! use std::sync::Arc;
//!
//! let audio_session = Arc::new(DesktopAudioSession::new());
//! let now_playing = Arc::new(DesktopNowPlaying::new());
//! // Pass both to CoreConfig::builder()
//! ```

mod audio_session;
mod now_playing;

pub use audio_session::DesktopAudioSession;
pub use now_playing::DesktopNowPlaying;
