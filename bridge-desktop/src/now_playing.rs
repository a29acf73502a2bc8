//! Desktop now-playing surface.
//!
//! Keeps the published metadata in memory and lets the host forward media
//! key presses through [`DesktopNowPlaying::press`]. Hosts that integrate an
//! OS media-controls service read the snapshot and call `press` from its
//! callbacks.

use bridge_traits::{
    error::Result,
    now_playing::{
        NowPlayingCenter, NowPlayingInfo, RemoteCommand, RemoteCommandConfig,
        RemoteCommandHandler,
    },
};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Default)]
struct State {
    info: Option<NowPlayingInfo>,
    commands: RemoteCommandConfig,
    handler: Option<RemoteCommandHandler>,
}

/// In-memory remote-control surface for desktop hosts.
#[derive(Default)]
pub struct DesktopNowPlaying {
    state: RwLock<State>,
}

impl DesktopNowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the published metadata.
    pub fn info(&self) -> Option<NowPlayingInfo> {
        self.state.read().info.clone()
    }

    pub fn commands(&self) -> RemoteCommandConfig {
        self.state.read().commands
    }

    /// Deliver a media key press to the installed handler.
    ///
    /// Presses for disabled buttons are ignored. Returns `true` if the press
    /// was delivered.
    pub fn press(&self, command: RemoteCommand) -> bool {
        let (handler, commands) = {
            let state = self.state.read();
            (state.handler.clone(), state.commands)
        };

        let enabled = match command {
            RemoteCommand::NextTrack => commands.next_track_enabled,
            RemoteCommand::PreviousTrack => commands.previous_track_enabled,
            RemoteCommand::SkipForward(_) => commands.forward_skip > Duration::ZERO,
            RemoteCommand::SkipBackward(_) => commands.backward_skip > Duration::ZERO,
            _ => true,
        };
        if !enabled {
            debug!(?command, "Ignoring press for disabled remote command");
            return false;
        }

        match handler {
            Some(handler) => {
                handler(command);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for DesktopNowPlaying {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("DesktopNowPlaying")
            .field("info", &state.info)
            .field("commands", &state.commands)
            .field("has_handler", &state.handler.is_some())
            .finish()
    }
}

impl NowPlayingCenter for DesktopNowPlaying {
    fn set_now_playing(&self, info: NowPlayingInfo) -> Result<()> {
        debug!(title = ?info.title, artist = ?info.artist, "Now playing updated");
        self.state.write().info = Some(info);
        Ok(())
    }

    fn update_playback(&self, elapsed: Duration, rate: f32) -> Result<()> {
        trace!(elapsed_ms = elapsed.as_millis() as u64, rate, "Now playing progress");
        if let Some(info) = self.state.write().info.as_mut() {
            info.elapsed = elapsed;
            info.rate = rate;
        }
        Ok(())
    }

    fn configure_commands(&self, config: RemoteCommandConfig) -> Result<()> {
        self.state.write().commands = config;
        Ok(())
    }

    fn set_command_handler(&self, handler: RemoteCommandHandler) {
        self.state.write().handler = Some(handler);
    }

    fn clear(&self) -> Result<()> {
        self.state.write().info = None;
        Ok(())
    }
}
