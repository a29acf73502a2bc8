//! Shared audio output (audio focus) abstraction.
//!
//! Every session in the process contends for one OS-level audio session.
//! Hosts expose it through [`AudioSessionControl`]:
//! - **iOS**: `AVAudioSession` categories and activation
//! - **Android**: audio focus requests and stream types
//! - **Desktop**: usually nothing to configure; see `bridge-desktop`

use crate::{error::Result, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category applied to the shared output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputCategory {
    /// Exclusive media playback; interrupts other non-mixable audio.
    Playback,
    /// Mixable, silenced by the ringer switch (notification sounds).
    Ambient,
    /// Playback while recording is possible; also routes to the earpiece.
    PlayAndRecord,
}

impl fmt::Display for OutputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputCategory::Playback => "playback",
            OutputCategory::Ambient => "ambient",
            OutputCategory::PlayAndRecord => "playAndRecord",
        };
        f.write_str(name)
    }
}

/// Options applied together with an [`OutputCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CategoryOptions {
    /// Mix with audio from other applications.
    pub mix_with_others: bool,
    /// Lower the volume of other applications while active.
    pub duck_others: bool,
}

/// Platform control over the shared audio output.
///
/// Implementations report rejections as errors; callers decide whether a
/// rejection matters.
pub trait AudioSessionControl: PlatformSendSync {
    /// Apply a category and its options.
    fn set_category(&self, category: OutputCategory, options: CategoryOptions) -> Result<()>;

    /// Activate or deactivate the shared output.
    fn set_active(&self, active: bool) -> Result<()>;

    /// Ask the platform to route remote-control events (lock screen,
    /// headset buttons) to this process.
    fn begin_receiving_remote_control_events(&self) -> Result<()> {
        Ok(())
    }
}
