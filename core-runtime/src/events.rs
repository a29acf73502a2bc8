//! # Event Bus System
//!
//! Outbound player events and the broadcast bus that carries them to the host
//! transport.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: [`PlayerEvent`], a session id plus a [`PlayerEventKind`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Events map one-to-one onto host method-channel calls: [`PlayerEvent::method_name`]
//! gives the `audio.onX` name and [`PlayerEvent::arguments`] the
//! `{playerId, value}` payload. Background-only events report
//! [`EventChannel::Background`] so the transport can route them to the
//! headless context.
//!
//! ```text
//! ┌────────────┐   emit    ┌───────────┐  subscribe  ┌──────────────────┐
//! │ Controller ├──────────>│ EventBus  ├────────────>│ Host transport   │
//! └────────────┘           │(broadcast)│             └──────────────────┘
//!                          │           ├────────────>┌──────────────────┐
//!                          └───────────┘             │ EventStream      │
//!                                                    │ (for_player "a") │
//!                                                    └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream, PlayerEvent, PlayerEventKind};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = EventStream::new(bus.subscribe()).for_player("a");
//!
//! bus.emit(PlayerEvent::new("a", PlayerEventKind::Duration(5000))).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.method_name(), "audio.onDuration");
//! # }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};

/// Default buffer size for the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 1000;

// ============================================================================
// Event Types
// ============================================================================

/// Event emitted on behalf of one playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEvent {
    /// Caller-supplied session id the event belongs to.
    pub player_id: String,
    pub kind: PlayerEventKind,
}

/// What happened to the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value")]
pub enum PlayerEventKind {
    /// A user-requested seek finished; `false` if it was interrupted.
    SeekComplete(bool),
    /// The item played to its end without looping.
    Complete,
    /// Periodic position report in milliseconds.
    CurrentPosition(u64),
    /// The engine failed; the session is now failed.
    Error(String),
    /// Duration became known, in milliseconds.
    Duration(u64),
    /// A remote play/pause changed the session state.
    NotificationPlayerStateChanged(bool),
    GotPreviousTrackCommand,
    GotNextTrackCommand,
    /// Remote play/pause mirrored to the headless context.
    NotificationBackgroundPlayerStateChanged {
        is_playing: bool,
        update_handle_monitor_key: Option<i64>,
    },
}

/// Host channel an event is delivered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventChannel {
    /// The main method channel.
    Main,
    /// The headless context's callback channel.
    Background,
}

impl PlayerEvent {
    pub fn new(player_id: impl Into<String>, kind: PlayerEventKind) -> Self {
        Self {
            player_id: player_id.into(),
            kind,
        }
    }

    /// Method name used on the host channel.
    pub fn method_name(&self) -> &'static str {
        match self.kind {
            PlayerEventKind::SeekComplete(_) => "audio.onSeekComplete",
            PlayerEventKind::Complete => "audio.onComplete",
            PlayerEventKind::CurrentPosition(_) => "audio.onCurrentPosition",
            PlayerEventKind::Error(_) => "audio.onError",
            PlayerEventKind::Duration(_) => "audio.onDuration",
            PlayerEventKind::NotificationPlayerStateChanged(_) => {
                "audio.onNotificationPlayerStateChanged"
            }
            PlayerEventKind::GotPreviousTrackCommand => "audio.onGotPreviousTrackCommand",
            PlayerEventKind::GotNextTrackCommand => "audio.onGotNextTrackCommand",
            PlayerEventKind::NotificationBackgroundPlayerStateChanged { .. } => {
                "audio.onNotificationBackgroundPlayerStateChanged"
            }
        }
    }

    /// Argument map sent with [`method_name`](Self::method_name).
    ///
    /// Always carries `playerId`; `value` is present for events that have one.
    pub fn arguments(&self) -> Value {
        let mut args = json!({ "playerId": self.player_id });
        let value = match &self.kind {
            PlayerEventKind::SeekComplete(finished) => Some(json!(finished)),
            PlayerEventKind::CurrentPosition(ms) | PlayerEventKind::Duration(ms) => {
                Some(json!(ms))
            }
            PlayerEventKind::Error(message) => Some(json!(message)),
            PlayerEventKind::NotificationPlayerStateChanged(is_playing) => {
                Some(json!(is_playing))
            }
            PlayerEventKind::NotificationBackgroundPlayerStateChanged {
                is_playing,
                update_handle_monitor_key,
            } => {
                args["updateHandleMonitorKey"] = json!(update_handle_monitor_key);
                Some(json!(if *is_playing { "playing" } else { "paused" }))
            }
            PlayerEventKind::Complete
            | PlayerEventKind::GotPreviousTrackCommand
            | PlayerEventKind::GotNextTrackCommand => None,
        };
        if let Some(value) = value {
            args["value"] = value;
        }
        args
    }

    pub fn channel(&self) -> EventChannel {
        match self.kind {
            PlayerEventKind::NotificationBackgroundPlayerStateChanged { .. } => {
                EventChannel::Background
            }
            _ => EventChannel::Main,
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &'static str {
        match self.kind {
            PlayerEventKind::SeekComplete(_) => "Seek completed",
            PlayerEventKind::Complete => "Playback completed",
            PlayerEventKind::CurrentPosition(_) => "Position update",
            PlayerEventKind::Error(_) => "Playback error",
            PlayerEventKind::Duration(_) => "Duration known",
            PlayerEventKind::NotificationPlayerStateChanged(_) => "Remote play state changed",
            PlayerEventKind::GotPreviousTrackCommand => "Remote previous track",
            PlayerEventKind::GotNextTrackCommand => "Remote next track",
            PlayerEventKind::NotificationBackgroundPlayerStateChanged { .. } => {
                "Background play state changed"
            }
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self.kind {
            PlayerEventKind::Error(_) => EventSeverity::Error,
            PlayerEventKind::Complete | PlayerEventKind::Duration(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    ///
    /// Replaces any previous filter.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events for `player_id`.
    pub fn for_player(self, player_id: impl Into<String>) -> Self {
        let player_id = player_id.into();
        self.filter(move |event| event.player_id == player_id)
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
