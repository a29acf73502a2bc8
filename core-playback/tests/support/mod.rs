//! Fake host capabilities shared by the controller integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{DesktopAudioSession, DesktopNowPlaying};
use bridge_traits::error::Result;
use bridge_traits::{
    BridgeError, EngineNotification, EngineObserver, EngineStatus, HeadlessRunner, MediaEngine,
    MediaEngineFactory, MediaSource, ObserverToken,
};
use core_playback::{ControllerConfig, ControllerHandle, PlaybackController};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventStream, PlayerEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const TRACK_DURATION: Duration = Duration::from_millis(5000);

// ============================================================================
// Fake Engine
// ============================================================================

struct EngineState {
    status: EngineStatus,
    duration: Duration,
    playing: bool,
    base: Duration,
    anchor: Option<Instant>,
    rate: f32,
    volume: f32,
    plays: usize,
    seeks: Vec<Duration>,
    next_token: u64,
    observers: Vec<(ObserverToken, EngineObserver)>,
    removed: Vec<EngineObserver>,
}

/// Engine whose clock is the (pausable) tokio clock.
pub struct FakeEngine {
    pub url: String,
    state: Mutex<EngineState>,
}

impl FakeEngine {
    fn new(url: &str, ready: bool) -> Self {
        Self {
            url: url.to_string(),
            state: Mutex::new(EngineState {
                status: if ready {
                    EngineStatus::ReadyToPlay
                } else {
                    EngineStatus::Unknown
                },
                duration: TRACK_DURATION,
                playing: false,
                base: Duration::ZERO,
                anchor: None,
                rate: 1.0,
                volume: 1.0,
                plays: 0,
                seeks: Vec::new(),
                next_token: 0,
                observers: Vec::new(),
                removed: Vec::new(),
            }),
        }
    }

    fn notify(&self, notification: EngineNotification) {
        let observers: Vec<EngineObserver> = self
            .state
            .lock()
            .observers
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(notification.clone());
        }
    }

    /// Finish loading.
    pub fn make_ready(&self) {
        self.state.lock().status = EngineStatus::ReadyToPlay;
        self.notify(EngineNotification::StatusChanged(EngineStatus::ReadyToPlay));
        self.notify(EngineNotification::DurationChanged(TRACK_DURATION));
    }

    pub fn fail(&self, message: &str) {
        self.state.lock().status = EngineStatus::Failed(message.to_string());
        self.notify(EngineNotification::StatusChanged(EngineStatus::Failed(
            message.to_string(),
        )));
    }

    /// Reach end of stream.
    pub fn finish(&self) {
        {
            let mut state = self.state.lock();
            state.base = state.duration;
            state.playing = false;
            state.anchor = None;
        }
        self.notify(EngineNotification::PlaybackEnded);
    }

    /// Deliver a notification through observers that were already removed,
    /// as a host would when a callback races with teardown.
    pub fn notify_stale(&self, notification: EngineNotification) {
        let removed = self.state.lock().removed.clone();
        for observer in removed {
            observer(notification.clone());
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn plays(&self) -> usize {
        self.state.lock().plays
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn rate(&self) -> f32 {
        self.state.lock().rate
    }

    pub fn seeks(&self) -> Vec<Duration> {
        self.state.lock().seeks.clone()
    }
}

fn current_position(state: &EngineState) -> Duration {
    let elapsed = state
        .anchor
        .map(|anchor| anchor.elapsed().mul_f32(state.rate))
        .unwrap_or_default();
    (state.base + elapsed).min(state.duration)
}

impl MediaEngine for FakeEngine {
    fn play(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.playing {
            state.playing = true;
            state.anchor = Some(Instant::now());
        }
        state.plays += 1;
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.base = current_position(&state);
        state.playing = false;
        state.anchor = None;
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.base = position.min(state.duration);
            if state.playing {
                state.anchor = Some(Instant::now());
            }
            state.seeks.push(position);
        }
        self.notify(EngineNotification::SeekCompleted { finished: true });
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.state.lock().volume = volume;
        Ok(())
    }

    fn set_rate(&self, rate: f32) -> Result<()> {
        let mut state = self.state.lock();
        state.base = current_position(&state);
        if state.playing {
            state.anchor = Some(Instant::now());
        }
        state.rate = rate;
        Ok(())
    }

    fn duration(&self) -> Option<Duration> {
        let state = self.state.lock();
        (state.status == EngineStatus::ReadyToPlay).then_some(state.duration)
    }

    fn position(&self) -> Duration {
        current_position(&self.state.lock())
    }

    fn status(&self) -> EngineStatus {
        self.state.lock().status.clone()
    }

    fn add_observer(&self, observer: EngineObserver) -> ObserverToken {
        let mut state = self.state.lock();
        state.next_token += 1;
        let token = ObserverToken(state.next_token);
        state.observers.push((token, observer));
        token
    }

    fn remove_observer(&self, token: ObserverToken) -> Result<()> {
        let mut state = self.state.lock();
        let index = state
            .observers
            .iter()
            .position(|(t, _)| *t == token)
            .ok_or_else(|| BridgeError::OperationFailed(format!("unknown {token}")))?;
        let (_, observer) = state.observers.remove(index);
        state.removed.push(observer);
        Ok(())
    }
}

// ============================================================================
// Fake Factory
// ============================================================================

/// Opens [`FakeEngine`]s and keeps every one it handed out.
pub struct FakeFactory {
    ready_immediately: bool,
    failing_url: Option<String>,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
}

impl FakeFactory {
    /// Engines are ready as soon as they are opened.
    pub fn ready() -> Self {
        Self {
            ready_immediately: true,
            failing_url: None,
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Engines stay loading until [`FakeEngine::make_ready`].
    pub fn deferred() -> Self {
        Self {
            ready_immediately: false,
            ..Self::ready()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing_url = Some(url.to_string());
        self
    }

    pub fn engines(&self) -> Vec<Arc<FakeEngine>> {
        self.engines.lock().clone()
    }

    pub fn last(&self) -> Arc<FakeEngine> {
        self.engines
            .lock()
            .last()
            .cloned()
            .expect("no engine opened yet")
    }

    pub fn opened(&self) -> usize {
        self.engines.lock().len()
    }
}

impl MediaEngineFactory for FakeFactory {
    fn open(&self, source: &MediaSource) -> Result<Arc<dyn MediaEngine>> {
        if self.failing_url.as_deref() == Some(source.url.as_str()) {
            return Err(BridgeError::SourceUnavailable(source.url.clone()));
        }
        let engine = Arc::new(FakeEngine::new(&source.url, self.ready_immediately));
        self.engines.lock().push(Arc::clone(&engine));
        Ok(engine)
    }
}

// ============================================================================
// Fake Headless Runner
// ============================================================================

#[derive(Default)]
pub struct FakeRunner {
    running: AtomicBool,
    fail: bool,
}

impl FakeRunner {
    /// Runner whose start always errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl HeadlessRunner for FakeRunner {
    async fn start(&self, _handle: i64) -> Result<bool> {
        if self.fail {
            return Err(BridgeError::NotAvailable("no background context".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(true)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: ControllerHandle,
    pub factory: Arc<FakeFactory>,
    pub session: Arc<DesktopAudioSession>,
    pub now_playing: Arc<DesktopNowPlaying>,
    pub runner: Option<Arc<FakeRunner>>,
    pub events: EventStream,
}

impl Harness {
    pub fn start(factory: FakeFactory) -> Self {
        Self::build(factory, None)
    }

    pub fn with_runner(factory: FakeFactory, runner: FakeRunner) -> Self {
        Self::build(factory, Some(Arc::new(runner)))
    }

    fn build(factory: FakeFactory, runner: Option<Arc<FakeRunner>>) -> Self {
        let factory = Arc::new(factory);
        let session = Arc::new(DesktopAudioSession::new());
        let now_playing = Arc::new(DesktopNowPlaying::new());

        let mut builder = CoreConfig::builder()
            .engine_factory(factory.clone())
            .audio_session(session.clone())
            .now_playing(now_playing.clone());
        if let Some(runner) = &runner {
            builder = builder
                .headless_runner(runner.clone())
                .enable_headless(true);
        }
        let config = builder.build().expect("valid core config");

        let controller =
            PlaybackController::spawn(config, ControllerConfig::default()).expect("controller");
        let events = controller.subscribe();

        Self {
            controller,
            factory,
            session,
            now_playing,
            runner,
            events,
        }
    }

    /// Next event, failing the test if none arrives within 10 s of
    /// (virtual) time.
    pub async fn next_event(&mut self) -> PlayerEvent {
        tokio::time::timeout(Duration::from_secs(10), self.events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event stream closed")
    }

    /// Next event that is not a position tick.
    pub async fn next_non_tick(&mut self) -> PlayerEvent {
        loop {
            let event = self.next_event().await;
            if event.method_name() != "audio.onCurrentPosition" {
                return event;
            }
        }
    }

    /// Let the controller drain its mailbox.
    pub async fn settle(&self) {
        self.controller.snapshot().await.expect("controller running");
    }

    /// Drop every event received so far.
    pub fn drain(&mut self) {
        while let Some(Ok(_)) = self.events.try_recv() {}
    }
}
