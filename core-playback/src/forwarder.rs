//! Outbound event emission tagged with the originating session.

use crate::types::SessionId;
use core_runtime::events::{EventBus, PlayerEvent, PlayerEventKind};
use tracing::trace;

/// Publishes player events on the shared [`EventBus`].
///
/// Events are emitted from the controller task only, so per-session order
/// follows processing order.
#[derive(Debug, Clone)]
pub(crate) struct EventForwarder {
    bus: EventBus,
}

impl EventForwarder {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn emit(&self, session: &SessionId, kind: PlayerEventKind) {
        let event = PlayerEvent::new(session.as_str(), kind);
        trace!(player_id = %session, method = event.method_name(), "Forwarding event");
        // No subscribers is not an error for the controller.
        self.bus.emit(event).ok();
    }
}
