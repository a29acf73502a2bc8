//! # Controller Configuration
//!
//! Tunables of the playback controller task.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback controller configuration.
///
/// Controls position reporting, mailbox sizing and the defaults a session
/// returns to on creation and release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between `onCurrentPosition` events while a session plays.
    ///
    /// Default: 200 ms.
    #[serde(default = "default_position_interval")]
    pub position_interval: Duration,

    /// Capacity of the controller mailbox shared by calls, engine
    /// callbacks, position ticks and remote commands.
    ///
    /// Progress callbacks arriving while it is full are dropped with a
    /// warning; end-of-stream and failure wait for capacity.
    ///
    /// Default: 1024.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Volume of a fresh or released session (0.0-1.0).
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Playback rate of a fresh or released session.
    ///
    /// Default: 1.0.
    #[serde(default = "default_playback_rate")]
    pub default_playback_rate: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            position_interval: default_position_interval(),
            mailbox_capacity: default_mailbox_capacity(),
            default_volume: default_volume(),
            default_playback_rate: default_playback_rate(),
        }
    }
}

impl ControllerConfig {
    pub fn with_position_interval(mut self, interval: Duration) -> Self {
        self.position_interval = interval;
        self
    }

    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.position_interval.is_zero() {
            return Err("position_interval must be > 0".to_string());
        }

        if self.mailbox_capacity == 0 {
            return Err("mailbox_capacity must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err("default_volume must be between 0.0 and 1.0".to_string());
        }

        if !self.default_playback_rate.is_finite() || self.default_playback_rate <= 0.0 {
            return Err("default_playback_rate must be a finite value > 0".to_string());
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_position_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_mailbox_capacity() -> usize {
    1024
}

fn default_volume() -> f32 {
    1.0
}

fn default_playback_rate() -> f32 {
    1.0
}
