//! Shared-output arbitration across sessions.
//!
//! The desired output category is derived from every session that is
//! playing or about to play:
//!
//! | Any such session with        | Category        | Options            |
//! |------------------------------|-----------------|--------------------|
//! | earpiece route or recording  | `PlayAndRecord` |                    |
//! | notification sound only      | `Ambient`       | `mix_with_others`  |
//! | otherwise                    | `Playback`      |                    |
//!
//! `duck_others` is added when any of them asked for ducking. Platform
//! rejections are logged and never fail the command that caused them.

use crate::registry::Registry;
use bridge_traits::{AudioSessionControl, CategoryOptions, OutputCategory};
use std::sync::Arc;
use tracing::{debug, warn};

/// Output requirements of one interested session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FocusNeeds {
    pub earpiece: bool,
    pub recording: bool,
    pub notification: bool,
    pub duck: bool,
}

/// Category and options for a set of interested sessions, or `None` when
/// there are none.
pub(crate) fn desired_category(
    needs: impl IntoIterator<Item = FocusNeeds>,
) -> Option<(OutputCategory, CategoryOptions)> {
    let mut any = false;
    let mut play_and_record = false;
    let mut notification = false;
    let mut duck_others = false;

    for need in needs {
        any = true;
        play_and_record |= need.earpiece || need.recording;
        notification |= need.notification;
        duck_others |= need.duck;
    }
    if !any {
        return None;
    }

    let (category, mix_with_others) = if play_and_record {
        (OutputCategory::PlayAndRecord, false)
    } else if notification {
        (OutputCategory::Ambient, true)
    } else {
        (OutputCategory::Playback, false)
    };
    Some((
        category,
        CategoryOptions {
            mix_with_others,
            duck_others,
        },
    ))
}

/// Applies the desired category and tracks activation of the shared output.
pub(crate) struct FocusCoordinator {
    session: Arc<dyn AudioSessionControl>,
    applied: Option<(OutputCategory, CategoryOptions)>,
    active: bool,
    remote_events_started: bool,
}

impl FocusCoordinator {
    pub fn new(session: Arc<dyn AudioSessionControl>) -> Self {
        Self {
            session,
            applied: None,
            active: false,
            remote_events_started: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Re-derive the category from `registry` and activate the output.
    ///
    /// Called before a session starts so the output is ready first.
    pub fn recompute_and_apply(&mut self, registry: &Registry) {
        if !self.apply_category(registry) {
            return;
        }
        if !self.active {
            self.set_active(true);
        }
    }

    /// A session stopped wanting output: narrow the category to the
    /// sessions still interested, then deactivate if nothing plays.
    pub fn relinquish(&mut self, registry: &Registry) {
        self.apply_category(registry);
        self.deactivate_if_idle(registry);
    }

    /// Deactivate once no session is playing.
    pub fn deactivate_if_idle(&mut self, registry: &Registry) {
        if self.active && !registry.any_playing() {
            self.set_active(false);
        }
    }

    /// Unconditional deactivation for shutdown.
    pub fn deactivate(&mut self) {
        if self.active {
            self.set_active(false);
        }
    }

    /// Apply the category the interested sessions need. Returns `false`
    /// when no session is interested.
    fn apply_category(&mut self, registry: &Registry) -> bool {
        let Some(desired) = desired_category(registry.players().filter_map(|p| p.focus_needs()))
        else {
            return false;
        };

        if self.applied != Some(desired) {
            let (category, options) = desired;
            debug!(%category, ?options, "Applying output category");
            match self.session.set_category(category, options) {
                Ok(()) => self.applied = Some(desired),
                Err(err) => warn!(%category, error = %err, "Output category rejected"),
            }
            if category == OutputCategory::Playback && !self.remote_events_started {
                match self.session.begin_receiving_remote_control_events() {
                    Ok(()) => self.remote_events_started = true,
                    Err(err) => warn!(error = %err, "Remote control events unavailable"),
                }
            }
        }
        true
    }

    fn set_active(&mut self, active: bool) {
        match self.session.set_active(active) {
            Ok(()) => {
                debug!(active, "Shared output activation changed");
                self.active = active;
            }
            Err(err) => warn!(active, error = %err, "Shared output activation rejected"),
        }
    }
}
