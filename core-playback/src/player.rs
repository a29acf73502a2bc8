//! # Single-Session Player
//!
//! Wraps at most one engine instance and the registrations tied to it.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──load──> Loading ──ready──> Ready ──start──> Playing <──> Paused
//!                   │                                   │
//!                   └──failure──> Failed      end/stop ─┴──> Stopped
//! ```
//!
//! Replacing the source or releasing the session first removes every engine
//! observer and the position ticker, then drops the engine. Callbacks that
//! were already queued carry the old generation and are ignored.
//!
//! Operations return a [`FocusChange`] telling the controller whether the
//! shared output should be re-evaluated.

use crate::command::{PlayRequest, Reply, SourceRequest};
use crate::config::ControllerConfig;
use crate::error::{PlaybackError, Result};
use crate::focus::FocusNeeds;
use crate::forwarder::EventForwarder;
use crate::mailbox::{Mailbox, ReplySender};
use crate::observers::ObserverSet;
use crate::types::{millis, PlayerStatus, PlayingRoute, SessionId};
use bridge_traits::{EngineNotification, EngineStatus, MediaEngine, MediaEngineFactory, MediaSource};
use core_runtime::events::PlayerEventKind;
use core_runtime::logging::redact_url;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Everything a player needs from its controller.
pub(crate) struct PlayerContext {
    pub factory: Arc<dyn MediaEngineFactory>,
    pub mailbox: Mailbox,
    pub forwarder: EventForwarder,
    pub settings: ControllerConfig,
}

/// What the controller should do with the shared output afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FocusChange {
    #[default]
    None,
    /// Recompute the category and activate.
    Acquire,
    /// Deactivate if nothing is playing any more.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekOrigin {
    /// Requested by the caller; completion is reported.
    User,
    /// Issued by the player itself (stop, loop, start position).
    Internal,
}

struct LoadedEngine {
    engine: Arc<dyn MediaEngine>,
    generation: u64,
}

pub(crate) struct Player {
    id: SessionId,
    source: Option<MediaSource>,
    loaded: Option<LoadedEngine>,
    observers: ObserverSet,
    status: PlayerStatus,
    volume: f32,
    playback_rate: f32,
    looping: bool,
    position: Duration,
    duration: Option<Duration>,
    route: PlayingRoute,
    is_notification: bool,
    recording_active: bool,
    duck_audio: bool,
    play_when_ready: bool,
    start_position: Option<Duration>,
    seeks: VecDeque<SeekOrigin>,
    pending_load: Option<ReplySender>,
}

impl Player {
    pub fn new(id: SessionId, settings: &ControllerConfig) -> Self {
        Self {
            id,
            source: None,
            loaded: None,
            observers: ObserverSet::default(),
            status: PlayerStatus::Idle,
            volume: settings.default_volume,
            playback_rate: settings.default_playback_rate,
            looping: false,
            position: Duration::ZERO,
            duration: None,
            route: PlayingRoute::default(),
            is_notification: false,
            recording_active: false,
            duck_audio: false,
            play_when_ready: false,
            start_position: None,
            seeks: VecDeque::new(),
            pending_load: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlayerStatus::Playing
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    /// Rate shown on the remote-control surface; zero unless playing.
    pub fn effective_rate(&self) -> f32 {
        if self.is_playing() {
            self.playback_rate
        } else {
            0.0
        }
    }

    /// Output requirements while this session plays or is about to.
    pub fn focus_needs(&self) -> Option<FocusNeeds> {
        let interested = self.is_playing() || self.play_when_ready;
        interested.then_some(FocusNeeds {
            earpiece: self.route == PlayingRoute::Earpiece,
            recording: self.recording_active,
            notification: self.is_notification,
            duck: self.duck_audio,
        })
    }

    fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.loaded.as_ref().map(|loaded| Arc::clone(&loaded.engine))
    }

    fn generation(&self) -> Option<u64> {
        self.loaded.as_ref().map(|loaded| loaded.generation)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Record the intent to play so the output can be claimed before the
    /// engine starts.
    pub fn prepare_play(&mut self, request: &PlayRequest) {
        self.volume = clamp_volume(request.volume);
        self.is_notification = request.respect_silence;
        self.recording_active = request.recording_active;
        self.duck_audio = request.duck_audio;
        self.play_when_ready = true;
        self.start_position = request.position.map(clamp_millis).or(self.start_position);
    }

    /// Load `request.url` (or reuse the loaded engine for the same source)
    /// and start once ready. Call after [`prepare_play`](Self::prepare_play).
    pub fn play(&mut self, ctx: &PlayerContext, request: &PlayRequest) -> FocusChange {
        let source = MediaSource::new(request.url.as_str(), request.is_local);
        let reusable = self.loaded.is_some()
            && self.source.as_ref() == Some(&source)
            && self.status != PlayerStatus::Failed;

        if reusable {
            debug!(player_id = %self.id, "Reusing loaded engine");
            if let Some(engine) = self.engine() {
                if let Err(err) = engine.set_volume(self.volume) {
                    warn!(player_id = %self.id, error = %err, "Engine rejected volume");
                }
            }
            return match self.status {
                PlayerStatus::Loading => FocusChange::None,
                _ => self.start(ctx),
            };
        }

        if self.load(ctx, source).is_err() {
            return FocusChange::Release;
        }
        self.settle(ctx)
    }

    /// Load a source without playing. `reply` is answered once the engine
    /// is ready, fails, or the load is superseded.
    pub fn set_url(
        &mut self,
        ctx: &PlayerContext,
        request: &SourceRequest,
        reply: ReplySender,
    ) -> FocusChange {
        self.is_notification = request.respect_silence;
        self.recording_active = request.recording_active;
        self.play_when_ready = false;

        let source = MediaSource::new(request.url.as_str(), request.is_local);
        if let Err(message) = self.load(ctx, source) {
            reply.send(Err(PlaybackError::Engine(message))).ok();
            return FocusChange::Release;
        }
        self.pending_load = Some(reply);
        match self.settle(ctx) {
            FocusChange::None => FocusChange::Release,
            other => other,
        }
    }

    /// Whether [`resume`](Self::resume) has anything to start. Marks the
    /// session as wanting output if so.
    pub fn prepare_resume(&mut self) -> bool {
        if self.loaded.is_none() || self.status == PlayerStatus::Failed {
            return false;
        }
        self.play_when_ready = true;
        true
    }

    pub fn resume(&mut self, ctx: &PlayerContext) -> FocusChange {
        match self.status {
            PlayerStatus::Loading | PlayerStatus::Playing => FocusChange::None,
            _ => self.start(ctx),
        }
    }

    pub fn pause(&mut self) -> FocusChange {
        let Some(engine) = self.engine() else {
            return FocusChange::None;
        };
        self.play_when_ready = false;
        self.start_position = None;

        if self.is_playing() {
            if let Err(err) = engine.pause() {
                warn!(player_id = %self.id, error = %err, "Engine rejected pause");
            }
            self.observers.stop_ticker();
            self.position = engine.position();
            self.status = PlayerStatus::Paused;
        }
        FocusChange::Release
    }

    /// Halt and rewind to the stream start.
    pub fn stop(&mut self) -> FocusChange {
        let Some(engine) = self.engine() else {
            return FocusChange::None;
        };
        self.play_when_ready = false;
        self.start_position = None;

        if let Err(err) = engine.pause() {
            warn!(player_id = %self.id, error = %err, "Engine rejected pause");
        }
        self.observers.stop_ticker();
        self.seek_internal(Duration::ZERO);
        if matches!(
            self.status,
            PlayerStatus::Ready | PlayerStatus::Playing | PlayerStatus::Paused
        ) {
            self.status = PlayerStatus::Stopped;
        }
        FocusChange::Release
    }

    /// Tear down the engine and return every setting to its default. The
    /// session id stays registered.
    pub fn release(&mut self, settings: &ControllerConfig) -> FocusChange {
        self.teardown(PlaybackError::Superseded("session released".into()));
        if self.source.take().is_some() {
            info!(player_id = %self.id, "Session released");
        }
        *self = Player::new(self.id.clone(), settings);
        FocusChange::Release
    }

    /// Absolute seek in milliseconds, clamped to `[0, duration]`. Without
    /// an engine the target is applied by the next load.
    pub fn seek(&mut self, position_ms: i64) -> Result<()> {
        let target = self.clamp_target(clamp_millis(position_ms));
        let Some(engine) = self.engine() else {
            self.position = target;
            self.start_position = Some(target);
            return Ok(());
        };
        engine.seek(target)?;
        self.seeks.push_back(SeekOrigin::User);
        self.position = target;
        Ok(())
    }

    /// Seek relative to the current position.
    pub fn seek_by(&mut self, offset_ms: i64) -> Result<()> {
        let current = i64::try_from(self.position_millis()).unwrap_or(i64::MAX);
        self.seek(current.saturating_add(offset_ms))
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume = clamp_volume(volume);
        if let Some(engine) = self.engine() {
            if let Err(err) = engine.set_volume(self.volume) {
                warn!(player_id = %self.id, error = %err, "Engine rejected volume");
            }
        }
    }

    /// Applied to the engine only while playing; otherwise cached for the
    /// next start. Callers pass an already validated positive rate.
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.playback_rate = rate as f32;
        if self.is_playing() {
            if let Some(engine) = self.engine() {
                engine.set_rate(self.playback_rate)?;
            }
        }
        Ok(())
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_route(&mut self, route: PlayingRoute) -> FocusChange {
        self.route = route;
        FocusChange::Acquire
    }

    /// Last known duration, refreshed from the engine when one is loaded.
    pub fn duration_millis(&mut self) -> u64 {
        if let Some(duration) = self.engine().and_then(|engine| engine.duration()) {
            self.duration = Some(duration);
        }
        self.duration.map(millis).unwrap_or(0)
    }

    /// Last known position, refreshed from the engine when one is loaded.
    pub fn position_millis(&mut self) -> u64 {
        if let Some(engine) = self.engine() {
            self.position = engine.position();
        }
        millis(self.position)
    }

    // ========================================================================
    // Engine Callbacks
    // ========================================================================

    /// Apply a notification from engine instance `generation`. Notifications
    /// from a replaced instance are dropped.
    pub fn handle_engine(
        &mut self,
        ctx: &PlayerContext,
        generation: u64,
        notification: EngineNotification,
    ) -> FocusChange {
        if self.generation() != Some(generation) {
            trace!(player_id = %self.id, generation, "Dropping stale engine callback");
            return FocusChange::None;
        }

        match notification {
            EngineNotification::StatusChanged(EngineStatus::ReadyToPlay) => self.on_ready(ctx),
            EngineNotification::StatusChanged(EngineStatus::Failed(message)) => {
                if self.status == PlayerStatus::Failed {
                    return FocusChange::None;
                }
                self.fail(ctx, message)
            }
            EngineNotification::StatusChanged(EngineStatus::Unknown) => FocusChange::None,
            EngineNotification::DurationChanged(duration) => {
                self.update_duration(ctx, duration);
                FocusChange::None
            }
            EngineNotification::SeekCompleted { finished } => {
                self.on_seek_completed(ctx, finished);
                FocusChange::None
            }
            EngineNotification::PlaybackEnded => self.on_ended(ctx),
        }
    }

    /// Position tick from the ticker of instance `generation`.
    pub fn handle_tick(&mut self, ctx: &PlayerContext, generation: u64) {
        if self.generation() != Some(generation) || !self.is_playing() {
            return;
        }
        let position = self.position_millis();
        ctx.forwarder
            .emit(&self.id, PlayerEventKind::CurrentPosition(position));
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn load(&mut self, ctx: &PlayerContext, source: MediaSource) -> std::result::Result<(), String> {
        self.teardown(PlaybackError::Superseded("replaced by a new source".into()));
        self.status = PlayerStatus::Loading;
        self.position = self.start_position.unwrap_or_default();
        self.duration = None;
        self.source = Some(source.clone());

        let engine = match ctx.factory.open(&source) {
            Ok(engine) => engine,
            Err(err) => {
                let message = err.to_string();
                warn!(
                    player_id = %self.id,
                    source = %redact_url(&source.url, source.is_local),
                    error = %message,
                    "Failed to open engine"
                );
                self.fail(ctx, message.clone());
                return Err(message);
            }
        };

        let generation = ctx.mailbox.next_generation();
        self.observers.register(
            engine.as_ref(),
            ctx.mailbox.engine_observer(self.id.clone(), generation),
        );
        if let Err(err) = engine.set_volume(self.volume) {
            warn!(player_id = %self.id, error = %err, "Engine rejected volume");
        }
        info!(
            player_id = %self.id,
            source = %redact_url(&source.url, source.is_local),
            generation,
            "Engine opened"
        );
        self.loaded = Some(LoadedEngine { engine, generation });
        Ok(())
    }

    /// Engines may be ready (or failed) as soon as they are opened.
    fn settle(&mut self, ctx: &PlayerContext) -> FocusChange {
        match self.engine().map(|engine| engine.status()) {
            Some(EngineStatus::ReadyToPlay) => self.on_ready(ctx),
            Some(EngineStatus::Failed(message)) => self.fail(ctx, message),
            _ => FocusChange::None,
        }
    }

    fn teardown(&mut self, reason: PlaybackError) {
        let loaded = self.loaded.take();
        self.observers
            .clear(loaded.as_ref().map(|loaded| loaded.engine.as_ref()));
        if let Some(loaded) = loaded {
            if let Err(err) = loaded.engine.pause() {
                trace!(player_id = %self.id, error = %err, "Pause during teardown failed");
            }
        }
        self.seeks.clear();
        if let Some(reply) = self.pending_load.take() {
            reply.send(Err(reason)).ok();
        }
    }

    fn start(&mut self, ctx: &PlayerContext) -> FocusChange {
        let (Some(engine), Some(generation)) = (self.engine(), self.generation()) else {
            return FocusChange::None;
        };

        if let Some(position) = self.start_position.take() {
            let target = self.clamp_target(position);
            self.seek_internal(target);
        }
        if let Err(err) = engine.play() {
            return self.fail(ctx, err.to_string());
        }
        if let Err(err) = engine.set_rate(self.playback_rate) {
            warn!(player_id = %self.id, error = %err, "Engine rejected playback rate");
        }

        self.status = PlayerStatus::Playing;
        self.play_when_ready = false;
        self.observers.start_ticker(ctx.mailbox.spawn_ticker(
            self.id.clone(),
            generation,
            ctx.settings.position_interval,
        ));
        debug!(player_id = %self.id, "Playback started");
        FocusChange::Acquire
    }

    fn on_ready(&mut self, ctx: &PlayerContext) -> FocusChange {
        if self.status != PlayerStatus::Loading {
            return FocusChange::None;
        }
        self.status = PlayerStatus::Ready;

        if let Some(duration) = self.engine().and_then(|engine| engine.duration()) {
            self.update_duration(ctx, duration);
        }
        if self.play_when_ready {
            self.ack_pending_load();
            return self.start(ctx);
        }
        if let Some(position) = self.start_position.take() {
            let target = self.clamp_target(position);
            self.seek_internal(target);
        }
        self.ack_pending_load();
        FocusChange::None
    }

    fn ack_pending_load(&mut self) {
        if let Some(reply) = self.pending_load.take() {
            reply.send(Ok(Reply::Ack)).ok();
        }
    }

    fn fail(&mut self, ctx: &PlayerContext, message: String) -> FocusChange {
        warn!(player_id = %self.id, error = %message, "Session failed");
        self.status = PlayerStatus::Failed;
        self.play_when_ready = false;
        self.start_position = None;
        self.observers.stop_ticker();
        ctx.forwarder
            .emit(&self.id, PlayerEventKind::Error(message.clone()));
        if let Some(reply) = self.pending_load.take() {
            reply.send(Err(PlaybackError::Engine(message))).ok();
        }
        FocusChange::Release
    }

    fn update_duration(&mut self, ctx: &PlayerContext, duration: Duration) {
        if self.duration == Some(duration) {
            return;
        }
        self.duration = Some(duration);
        ctx.forwarder
            .emit(&self.id, PlayerEventKind::Duration(millis(duration)));
    }

    fn on_seek_completed(&mut self, ctx: &PlayerContext, finished: bool) {
        let origin = self.seeks.pop_front().unwrap_or(SeekOrigin::Internal);
        if let Some(engine) = self.engine() {
            self.position = engine.position();
        }
        if origin == SeekOrigin::User {
            ctx.forwarder
                .emit(&self.id, PlayerEventKind::SeekComplete(finished));
            ctx.forwarder
                .emit(&self.id, PlayerEventKind::CurrentPosition(millis(self.position)));
        }
    }

    fn on_ended(&mut self, ctx: &PlayerContext) -> FocusChange {
        if !self.is_playing() {
            return FocusChange::None;
        }
        let Some(engine) = self.engine() else {
            return FocusChange::None;
        };

        self.seek_internal(Duration::ZERO);
        if self.looping {
            if let Err(err) = engine.play() {
                return self.fail(ctx, err.to_string());
            }
            if let Err(err) = engine.set_rate(self.playback_rate) {
                warn!(player_id = %self.id, error = %err, "Engine rejected playback rate");
            }
            debug!(player_id = %self.id, "Looping to start");
            return FocusChange::None;
        }

        self.observers.stop_ticker();
        self.status = PlayerStatus::Stopped;
        ctx.forwarder.emit(&self.id, PlayerEventKind::Complete);
        FocusChange::Release
    }

    fn seek_internal(&mut self, target: Duration) {
        let Some(engine) = self.engine() else {
            self.position = target;
            return;
        };
        match engine.seek(target) {
            Ok(()) => {
                self.seeks.push_back(SeekOrigin::Internal);
                self.position = target;
            }
            Err(err) => warn!(player_id = %self.id, error = %err, "Engine rejected seek"),
        }
    }

    fn clamp_target(&self, target: Duration) -> Duration {
        let duration = self
            .duration
            .or_else(|| self.engine().and_then(|engine| engine.duration()));
        match duration {
            Some(duration) if target > duration => duration,
            _ => target,
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown(PlaybackError::ControllerClosed);
    }
}

fn clamp_volume(volume: f64) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0) as f32
}

fn clamp_millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
