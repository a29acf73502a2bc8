//! # Playback Controller
//!
//! Owns every session and the shared output, and processes all work on a
//! single task.
//!
//! ## Architecture
//!
//! ```text
//! ControllerHandle::call ─┐
//! engine observers ───────┤
//! position tickers ───────┼──> mailbox (bounded mpsc) ──> controller task
//! remote-control presses ─┘                                  │
//!                                                            ├─ Registry ─ Player ─ MediaEngine
//!                                                            ├─ FocusCoordinator ─ AudioSessionControl
//!                                                            └─ EventForwarder ─ EventBus
//! ```
//!
//! Replies are sent as soon as a command has been applied, except `setUrl`,
//! which answers once the engine is ready (or has failed).
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{ControllerConfig, PlaybackController};
//! use serde_json::json;
//!
//! let controller = PlaybackController::spawn(core_config, ControllerConfig::default())?;
//! let mut events = controller.subscribe().for_player("a");
//!
//! controller
//!     .invoke("play", json!({ "playerId": "a", "url": "https://example.com/1.mp3" }))
//!     .await?;
//! let event = events.recv().await?;
//! ```

use crate::command::{
    CallResult, Command, MethodCall, NotificationRequest, PlayRequest, Reply, SourceRequest,
};
use crate::config::ControllerConfig;
use crate::dispatcher::{self, Capabilities};
use crate::error::{PlaybackError, Result};
use crate::focus::FocusCoordinator;
use crate::forwarder::EventForwarder;
use crate::mailbox::{Mailbox, Message, ReplySender};
use crate::player::{FocusChange, PlayerContext};
use crate::registry::Registry;
use crate::types::{ControllerSnapshot, PlayingRoute, SessionId, SessionSnapshot};
use bridge_traits::{
    EngineNotification, HeadlessRunner, NowPlayingCenter, NowPlayingInfo, RemoteCommand,
    RemoteCommandConfig,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream, PlayerEventKind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Cloneable handle to a running controller.
///
/// The controller task stops once [`shutdown`](Self::shutdown) is called or
/// every handle has been dropped; either way all sessions are released.
#[derive(Clone)]
pub struct ControllerHandle {
    sender: mpsc::Sender<Message>,
    events: EventBus,
}

impl ControllerHandle {
    /// Submit a call and wait for its reply.
    pub async fn call(&self, call: MethodCall) -> CallResult {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Call { call, reply })
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?;
        response.await.map_err(|_| PlaybackError::ControllerClosed)?
    }

    /// Shorthand for [`call`](Self::call) with an argument map.
    pub async fn invoke(&self, method: &str, arguments: Value) -> CallResult {
        self.call(MethodCall::new(method, arguments)).await
    }

    /// New subscription to outbound events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current sessions and output state.
    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Inspect { reply })
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?;
        response.await.map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Release every session, deactivate the shared output and stop the
    /// controller task. Later calls fail with
    /// [`PlaybackError::ControllerClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.sender
            .send(Message::Shutdown { done })
            .await
            .map_err(|_| PlaybackError::ControllerClosed)?;
        finished.await.map_err(|_| PlaybackError::ControllerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("closed", &self.is_closed())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

/// The controller task state. Created and driven by [`spawn`](Self::spawn).
pub struct PlaybackController {
    ctx: PlayerContext,
    registry: Registry,
    focus: FocusCoordinator,
    now_playing: Option<Arc<dyn NowPlayingCenter>>,
    headless: Option<Arc<dyn HeadlessRunner>>,
    receiver: mpsc::Receiver<Message>,
    last_active: Option<SessionId>,
    notification_set: bool,
    update_handle_monitor_key: Option<i64>,
}

impl PlaybackController {
    /// Validate both configurations and start the controller task on the
    /// current tokio runtime.
    pub fn spawn(core: CoreConfig, settings: ControllerConfig) -> Result<ControllerHandle> {
        settings.validate().map_err(PlaybackError::InvalidConfig)?;
        core.validate()
            .map_err(|err| PlaybackError::InvalidConfig(err.to_string()))?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            PlaybackError::InvalidConfig(format!("no tokio runtime available: {err}"))
        })?;

        let (controller, handle) = Self::new(&core, settings);
        info!(
            remote_controls = core.features.enable_remote_controls,
            headless = controller.headless.is_some(),
            "Playback controller started"
        );
        runtime.spawn(controller.run());

        Ok(handle)
    }

    fn new(core: &CoreConfig, settings: ControllerConfig) -> (Self, ControllerHandle) {
        let (sender, receiver) = mpsc::channel(settings.mailbox_capacity);
        let events = EventBus::new(core.event_buffer_size);
        let mailbox = Mailbox::new(&sender);

        if core.features.enable_remote_controls {
            if let Some(center) = &core.now_playing {
                center.set_command_handler(mailbox.remote_handler());
            }
        }

        let controller = PlaybackController {
            ctx: PlayerContext {
                factory: Arc::clone(&core.engine_factory),
                mailbox,
                forwarder: EventForwarder::new(events.clone()),
                settings,
            },
            registry: Registry::default(),
            focus: FocusCoordinator::new(Arc::clone(&core.audio_session)),
            now_playing: core.now_playing.clone(),
            headless: core.active_headless_runner(),
            receiver,
            last_active: None,
            notification_set: false,
            update_handle_monitor_key: None,
        };
        (controller, ControllerHandle { sender, events })
    }

    async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            if !self.handle_message(message) {
                return;
            }
        }
        debug!("All controller handles dropped");
        self.shutdown();
    }

    /// Process one message. Returns `false` once the controller has shut
    /// down.
    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::Call { call, reply } => self.handle_call(call, reply),
            Message::Engine {
                session,
                generation,
                notification,
            } => self.handle_engine(session, generation, notification),
            Message::Tick {
                session,
                generation,
            } => {
                if let Some(player) = self.registry.get_mut(&session) {
                    player.handle_tick(&self.ctx, generation);
                }
            }
            Message::Remote(command) => self.handle_remote(command),
            Message::Inspect { reply } => {
                reply.send(self.snapshot()).ok();
            }
            Message::Shutdown { done } => {
                self.shutdown();
                done.send(()).ok();
                return false;
            }
        }
        true
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            now_playing: self.now_playing.is_some(),
            headless: self.headless.is_some(),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn handle_call(&mut self, call: MethodCall, reply: ReplySender) {
        let (session, command) = match dispatcher::route(&call, self.capabilities()) {
            Ok(routed) => routed,
            Err(err) => {
                debug!(method = %call.method, error = %err, "Rejected call");
                reply.send(Err(err)).ok();
                return;
            }
        };
        debug!(player_id = %session, %command, "Handling call");

        let result = match command {
            Command::SetUrl(request) => {
                self.set_url(&session, &request, reply);
                return;
            }
            Command::Play(request) => self.play(&session, &request),
            Command::Resume => self.resume(&session),
            Command::Pause => self.pause(&session),
            Command::Stop => self.stop(&session),
            Command::Release => self.release(&session),
            Command::Seek(position) => self.seek(&session, position),
            Command::SetVolume(volume) => {
                self.registry
                    .get_or_create(&session, &self.ctx.settings)
                    .set_volume(volume);
                Ok(Reply::Ack)
            }
            Command::SetPlaybackRate(rate) => self.set_playback_rate(&session, rate),
            Command::SetReleaseMode { looping } => {
                self.registry
                    .get_or_create(&session, &self.ctx.settings)
                    .set_looping(looping);
                Ok(Reply::Ack)
            }
            Command::GetDuration => Ok(Reply::Millis(
                self.registry
                    .get_or_create(&session, &self.ctx.settings)
                    .duration_millis(),
            )),
            Command::GetCurrentPosition => Ok(Reply::Millis(
                self.registry
                    .get_or_create(&session, &self.ctx.settings)
                    .position_millis(),
            )),
            Command::EarpieceOrSpeakersToggle(route) => self.set_route(&session, route),
            Command::SetNotification(request) => self.set_notification(&session, request),
            Command::StartHeadlessService { handle } => self.start_headless(&session, handle),
            Command::MonitorNotificationStateChanges { handle } => {
                self.registry.get_or_create(&session, &self.ctx.settings);
                self.update_handle_monitor_key = Some(handle);
                Ok(Reply::Ack)
            }
        };

        if let Err(err) = &result {
            debug!(player_id = %session, error = %err, "Call failed");
        }
        reply.send(result).ok();
    }

    fn play(&mut self, session: &SessionId, request: &PlayRequest) -> CallResult {
        self.registry
            .get_or_create(session, &self.ctx.settings)
            .prepare_play(request);
        self.focus.recompute_and_apply(&self.registry);

        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .play(&self.ctx, request);
        self.apply_focus(change);

        self.last_active = Some(session.clone());
        self.refresh_now_playing();
        Ok(Reply::Ack)
    }

    fn resume(&mut self, session: &SessionId) -> CallResult {
        let startable = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .prepare_resume();
        if startable {
            self.focus.recompute_and_apply(&self.registry);
            let change = self
                .registry
                .get_or_create(session, &self.ctx.settings)
                .resume(&self.ctx);
            self.apply_focus(change);
            self.last_active = Some(session.clone());
            self.refresh_now_playing();
        }
        Ok(Reply::Ack)
    }

    fn pause(&mut self, session: &SessionId) -> CallResult {
        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .pause();
        self.apply_focus(change);
        self.refresh_now_playing();
        Ok(Reply::Ack)
    }

    fn stop(&mut self, session: &SessionId) -> CallResult {
        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .stop();
        self.apply_focus(change);
        self.refresh_now_playing();
        Ok(Reply::Ack)
    }

    fn release(&mut self, session: &SessionId) -> CallResult {
        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .release(&self.ctx.settings);
        self.apply_focus(change);
        Ok(Reply::Ack)
    }

    fn seek(&mut self, session: &SessionId, position: i64) -> CallResult {
        self.registry
            .get_or_create(session, &self.ctx.settings)
            .seek(position)?;
        Ok(Reply::Ack)
    }

    fn set_playback_rate(&mut self, session: &SessionId, rate: f64) -> CallResult {
        self.registry
            .get_or_create(session, &self.ctx.settings)
            .set_playback_rate(rate)?;
        self.refresh_now_playing();
        Ok(Reply::Ack)
    }

    fn set_route(&mut self, session: &SessionId, route: PlayingRoute) -> CallResult {
        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .set_route(route);
        self.apply_focus(change);
        Ok(Reply::Ack)
    }

    fn set_url(&mut self, session: &SessionId, request: &SourceRequest, reply: ReplySender) {
        let change = self
            .registry
            .get_or_create(session, &self.ctx.settings)
            .set_url(&self.ctx, request, reply);
        self.apply_focus(change);
    }

    /// Acknowledges at once; the runner starts in the background.
    fn start_headless(&mut self, session: &SessionId, handle: i64) -> CallResult {
        let Some(runner) = self.headless.clone() else {
            return Err(PlaybackError::NotImplemented("startHeadlessService".into()));
        };
        self.registry.get_or_create(session, &self.ctx.settings);

        tokio::spawn(async move {
            match runner.start(handle).await {
                Ok(started) => debug!(handle, started, "Headless runner started"),
                Err(err) => warn!(handle, error = %err, "Headless runner failed to start"),
            }
        });
        Ok(Reply::Ack)
    }

    fn set_notification(&mut self, session: &SessionId, request: NotificationRequest) -> CallResult {
        let Some(center) = self.now_playing.clone() else {
            return Err(PlaybackError::NotImplemented("setNotification".into()));
        };
        let player = self.registry.get_or_create(session, &self.ctx.settings);

        let info = NowPlayingInfo {
            title: request.title,
            album_title: request.album_title,
            artist: request.artist,
            image_url: request.image_url,
            duration: request.duration.map(seconds),
            elapsed: seconds(request.elapsed_time),
            rate: player.effective_rate(),
        };
        if let Err(err) = center.set_now_playing(info) {
            warn!(player_id = %session, error = %err, "Now playing metadata rejected");
        }

        let commands = RemoteCommandConfig {
            forward_skip: seconds(request.forward_skip_interval),
            backward_skip: seconds(request.backward_skip_interval),
            previous_track_enabled: request.enable_previous_track_button.unwrap_or(false),
            next_track_enabled: request.enable_next_track_button.unwrap_or(false),
        };
        if let Err(err) = center.configure_commands(commands) {
            warn!(player_id = %session, error = %err, "Remote command configuration rejected");
        }

        self.last_active = Some(session.clone());
        self.notification_set = true;
        Ok(Reply::Ack)
    }

    // ========================================================================
    // Engine Callbacks
    // ========================================================================

    fn handle_engine(
        &mut self,
        session: SessionId,
        generation: u64,
        notification: EngineNotification,
    ) {
        let Some(player) = self.registry.get_mut(&session) else {
            trace!(player_id = %session, "Engine callback for unknown session");
            return;
        };
        let change = player.handle_engine(&self.ctx, generation, notification);
        self.apply_focus(change);
        if self.last_active.as_ref() == Some(&session) {
            self.refresh_now_playing();
        }
    }

    // ========================================================================
    // Remote Commands
    // ========================================================================

    /// Remote presses act on the last-active session and never create one.
    fn handle_remote(&mut self, command: RemoteCommand) {
        let Some(session) = self.last_active.clone() else {
            debug!(?command, "Remote command with no active session");
            return;
        };
        let Some(playing) = self.registry.get(&session).map(|player| player.is_playing()) else {
            debug!(player_id = %session, ?command, "Remote command for released session");
            return;
        };
        debug!(player_id = %session, ?command, "Handling remote command");

        match command {
            RemoteCommand::Play => {
                self.resume(&session).ok();
                self.notify_state(&session, true);
            }
            RemoteCommand::Pause => {
                self.pause(&session).ok();
                self.notify_state(&session, false);
            }
            RemoteCommand::TogglePlayPause => {
                if playing {
                    self.pause(&session).ok();
                    self.notify_state(&session, false);
                } else {
                    self.resume(&session).ok();
                    self.notify_state(&session, true);
                }
            }
            RemoteCommand::NextTrack => self
                .ctx
                .forwarder
                .emit(&session, PlayerEventKind::GotNextTrackCommand),
            RemoteCommand::PreviousTrack => self
                .ctx
                .forwarder
                .emit(&session, PlayerEventKind::GotPreviousTrackCommand),
            RemoteCommand::SkipForward(interval) => {
                self.remote_seek_by(&session, signed_millis(interval))
            }
            RemoteCommand::SkipBackward(interval) => {
                self.remote_seek_by(&session, -signed_millis(interval))
            }
            RemoteCommand::ChangePlaybackPosition(position) => {
                if let Err(err) = self.seek(&session, signed_millis(position)) {
                    warn!(player_id = %session, error = %err, "Remote seek failed");
                }
            }
        }
    }

    fn remote_seek_by(&mut self, session: &SessionId, offset_ms: i64) {
        let Some(player) = self.registry.get_mut(session) else {
            return;
        };
        if let Err(err) = player.seek_by(offset_ms) {
            warn!(player_id = %session, error = %err, "Remote skip failed");
        }
    }

    fn notify_state(&self, session: &SessionId, is_playing: bool) {
        self.ctx.forwarder.emit(
            session,
            PlayerEventKind::NotificationPlayerStateChanged(is_playing),
        );
        let background_running = self
            .headless
            .as_ref()
            .is_some_and(|runner| runner.is_running());
        if background_running {
            self.ctx.forwarder.emit(
                session,
                PlayerEventKind::NotificationBackgroundPlayerStateChanged {
                    is_playing,
                    update_handle_monitor_key: self.update_handle_monitor_key,
                },
            );
        }
    }

    // ========================================================================
    // Shared State
    // ========================================================================

    fn apply_focus(&mut self, change: FocusChange) {
        match change {
            FocusChange::None => {}
            FocusChange::Acquire => self.focus.recompute_and_apply(&self.registry),
            FocusChange::Release => self.focus.relinquish(&self.registry),
        }
    }

    /// Push elapsed time and rate of the last-active session once
    /// now-playing metadata has been set.
    fn refresh_now_playing(&mut self) {
        if !self.notification_set {
            return;
        }
        let (Some(center), Some(session)) = (&self.now_playing, &self.last_active) else {
            return;
        };
        let Some(player) = self.registry.get_mut(session) else {
            return;
        };
        let elapsed = Duration::from_millis(player.position_millis());
        if let Err(err) = center.update_playback(elapsed, player.effective_rate()) {
            warn!(player_id = %session, error = %err, "Now playing update rejected");
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        let mut sessions: Vec<SessionSnapshot> = self
            .registry
            .players()
            .map(|player| SessionSnapshot {
                id: player.id().clone(),
                status: player.status(),
                registrations: player.observer_count(),
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        ControllerSnapshot {
            sessions,
            output_active: self.focus.is_active(),
            last_active: self.last_active.clone(),
        }
    }

    fn shutdown(&mut self) {
        let sessions = self.registry.len();
        self.registry.release_all(&self.ctx);
        self.focus.deactivate();
        if self.notification_set {
            if let Some(center) = &self.now_playing {
                if let Err(err) = center.clear() {
                    warn!(error = %err, "Failed to clear now playing metadata");
                }
            }
        }
        self.last_active = None;
        info!(sessions, "Playback controller stopped");
    }
}

fn seconds(value: i64) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or(0))
}

fn signed_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
