//! Desktop shared-output implementation.
//!
//! Desktop mixers let every application play at once, so there is no
//! category to negotiate. The session still tracks what the core asked for so
//! hosts can inspect it and so activation stays balanced.

use bridge_traits::{
    audio_session::{AudioSessionControl, CategoryOptions, OutputCategory},
    error::Result,
};
use parking_lot::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct SessionState {
    category: Option<(OutputCategory, CategoryOptions)>,
    active: bool,
    remote_events: bool,
    activations: u64,
}

/// Audio session for desktop hosts.
#[derive(Debug, Default)]
pub struct DesktopAudioSession {
    state: RwLock<SessionState>,
}

impl DesktopAudioSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Category most recently applied, if any.
    pub fn category(&self) -> Option<(OutputCategory, CategoryOptions)> {
        self.state.read().category
    }

    pub fn is_active(&self) -> bool {
        self.state.read().active
    }

    /// Number of inactive → active transitions since creation.
    pub fn activation_count(&self) -> u64 {
        self.state.read().activations
    }

    pub fn receives_remote_events(&self) -> bool {
        self.state.read().remote_events
    }
}

impl AudioSessionControl for DesktopAudioSession {
    fn set_category(&self, category: OutputCategory, options: CategoryOptions) -> Result<()> {
        debug!(%category, mix = options.mix_with_others, duck = options.duck_others, "Desktop audio category");
        self.state.write().category = Some((category, options));
        Ok(())
    }

    fn set_active(&self, active: bool) -> Result<()> {
        let mut state = self.state.write();
        if active && !state.active {
            state.activations += 1;
        }
        state.active = active;
        debug!(active, "Desktop audio session activation");
        Ok(())
    }

    fn begin_receiving_remote_control_events(&self) -> Result<()> {
        self.state.write().remote_events = true;
        Ok(())
    }
}
