//! Session registry keyed by caller-supplied id.

use crate::config::ControllerConfig;
use crate::player::{Player, PlayerContext};
use crate::types::SessionId;
use std::collections::HashMap;
use tracing::debug;

/// All live sessions. Owned by the controller task; never shared.
#[derive(Default)]
pub(crate) struct Registry {
    players: HashMap<SessionId, Player>,
}

impl Registry {
    /// Fetch the session for `id`, creating it with default settings.
    pub fn get_or_create(&mut self, id: &SessionId, settings: &ControllerConfig) -> &mut Player {
        self.players.entry(id.clone()).or_insert_with(|| {
            debug!(player_id = %id, "Creating session");
            Player::new(id.clone(), settings)
        })
    }

    pub fn get(&self, id: &SessionId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn any_playing(&self) -> bool {
        self.players().any(Player::is_playing)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Release every session and forget them.
    pub fn release_all(&mut self, ctx: &PlayerContext) {
        for (_, mut player) in self.players.drain() {
            player.release(&ctx.settings);
        }
    }
}
