//! Now-playing metadata and remote-control surface.
//!
//! Lock screens, notification shades and headset buttons are owned by the
//! OS. The core publishes metadata to them and receives button presses back
//! through a [`RemoteCommandHandler`].

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Metadata shown on the remote-control surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub title: Option<String>,
    pub album_title: Option<String>,
    pub artist: Option<String>,
    /// Artwork location; hosts fetch it themselves.
    pub image_url: Option<String>,
    pub duration: Option<Duration>,
    pub elapsed: Duration,
    /// Effective playback rate; `0.0` while paused.
    pub rate: f32,
}

/// Which remote buttons are enabled and how far the skip buttons jump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommandConfig {
    /// Forward skip interval; zero disables the button.
    pub forward_skip: Duration,
    /// Backward skip interval; zero disables the button.
    pub backward_skip: Duration,
    pub previous_track_enabled: bool,
    pub next_track_enabled: bool,
}

/// A button press or scrub coming from the remote-control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteCommand {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    SkipForward(Duration),
    SkipBackward(Duration),
    ChangePlaybackPosition(Duration),
}

/// Callback receiving remote commands. May be invoked from any thread.
pub type RemoteCommandHandler = Arc<dyn Fn(RemoteCommand) + Send + Sync>;

/// Host remote-control surface.
pub trait NowPlayingCenter: PlatformSendSync {
    /// Replace the displayed metadata.
    fn set_now_playing(&self, info: NowPlayingInfo) -> Result<()>;

    /// Update only the elapsed time and rate of the current entry.
    fn update_playback(&self, elapsed: Duration, rate: f32) -> Result<()>;

    /// Enable/disable buttons.
    fn configure_commands(&self, config: RemoteCommandConfig) -> Result<()>;

    /// Install the handler that receives button presses, replacing any
    /// previous one.
    fn set_command_handler(&self, handler: RemoteCommandHandler);

    /// Remove the current entry from the surface.
    fn clear(&self) -> Result<()>;
}
