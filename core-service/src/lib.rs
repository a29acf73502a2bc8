//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media engine,
//! audio session, now-playing surface, headless runner) into a running
//! playback controller. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and only supply an engine
//! factory; mobile hosts inject every bridge explicitly.
//!
//! ```ignore
//! use core_service::{CoreDependencies, CoreService};
//!
//! let service = CoreService::start(CoreDependencies::new(engine_factory))?;
//! let reply = service.handle(method_call).await; // send back on the host channel
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_playback::{ControllerConfig, ControllerHandle, MethodCall, WireReply};
pub use core_runtime::events::{EventStream, PlayerEvent};
pub use core_runtime::logging::{init_logging, LoggingConfig};

use std::sync::Arc;

use bridge_traits::{AudioSessionControl, HeadlessRunner, MediaEngineFactory, NowPlayingCenter};
use core_playback::PlaybackController;
use core_runtime::config::CoreConfig;
use tracing::info;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub engine_factory: Arc<dyn MediaEngineFactory>,
    pub audio_session: Option<Arc<dyn AudioSessionControl>>,
    pub now_playing: Option<Arc<dyn NowPlayingCenter>>,
    pub headless_runner: Option<Arc<dyn HeadlessRunner>>,
}

impl CoreDependencies {
    /// Dependency bundle with only the required engine factory; the rest
    /// fall back to platform defaults where they exist.
    pub fn new(engine_factory: Arc<dyn MediaEngineFactory>) -> Self {
        Self {
            engine_factory,
            audio_session: None,
            now_playing: None,
            headless_runner: None,
        }
    }

    pub fn with_audio_session(mut self, session: Arc<dyn AudioSessionControl>) -> Self {
        self.audio_session = Some(session);
        self
    }

    pub fn with_now_playing(mut self, center: Arc<dyn NowPlayingCenter>) -> Self {
        self.now_playing = Some(center);
        self
    }

    pub fn with_headless_runner(mut self, runner: Arc<dyn HeadlessRunner>) -> Self {
        self.headless_runner = Some(runner);
        self
    }

    /// Compose a validated [`CoreConfig`]. Remote controls and headless
    /// support are enabled when their bridge is available.
    pub fn into_config(self) -> Result<CoreConfig> {
        let remote_controls = self.now_playing.is_some() || cfg!(feature = "desktop-shims");
        let headless = self.headless_runner.is_some();

        let mut builder = CoreConfig::builder()
            .engine_factory(self.engine_factory)
            .enable_remote_controls(remote_controls)
            .enable_headless(headless);
        if let Some(session) = self.audio_session {
            builder = builder.audio_session(session);
        }
        if let Some(center) = self.now_playing {
            builder = builder.now_playing(center);
        }
        if let Some(runner) = self.headless_runner {
            builder = builder.headless_runner(runner);
        }
        Ok(builder.build()?)
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone, Debug)]
pub struct CoreService {
    controller: ControllerHandle,
}

impl CoreService {
    /// Start a controller with default settings. Must be called within a
    /// tokio runtime.
    pub fn start(deps: CoreDependencies) -> Result<Self> {
        Self::start_with(deps, ControllerConfig::default())
    }

    pub fn start_with(deps: CoreDependencies, settings: ControllerConfig) -> Result<Self> {
        let config = deps.into_config()?;
        let controller = PlaybackController::spawn(config, settings)?;
        info!("Core service started");
        Ok(Self { controller })
    }

    /// Access the running controller.
    pub fn controller(&self) -> &ControllerHandle {
        &self.controller
    }

    /// Answer one call from the host message channel.
    pub async fn handle(&self, call: MethodCall) -> WireReply {
        WireReply::from_result(&self.controller.call(call).await)
    }

    pub fn subscribe(&self) -> EventStream {
        self.controller.subscribe()
    }

    /// Release all sessions and stop the controller.
    pub async fn shutdown(&self) -> Result<()> {
        self.controller.shutdown().await?;
        info!("Core service stopped");
        Ok(())
    }
}
