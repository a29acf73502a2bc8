//! # Multi-Session Playback Controller
//!
//! Drives any number of independent playback sessions, each keyed by a
//! caller-supplied id, on top of a host-provided media engine.
//!
//! ## Overview
//!
//! This crate handles:
//! - Routing and validating inbound method calls ([`MethodCall`])
//! - Per-session engine lifecycle, looping, seeking and position reporting
//! - Arbitration of the process-wide shared audio output
//! - Now-playing metadata and remote-control routing
//! - Forwarding session events to the host on the core [`EventBus`](core_runtime::events::EventBus)
//!
//! All state lives on one controller task; see [`controller`] for the
//! message flow.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{ControllerConfig, PlaybackController, WireReply};
//!
//! let controller = PlaybackController::spawn(core_config, ControllerConfig::default())?;
//!
//! // From the host message channel:
//! let result = controller.call(method_call).await;
//! send_back(WireReply::from_result(&result));
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod types;

mod dispatcher;
mod focus;
mod forwarder;
mod mailbox;
mod observers;
mod player;
mod registry;

pub use command::{CallResult, Command, MethodCall, Reply, WireReply};
pub use config::ControllerConfig;
pub use controller::{ControllerHandle, PlaybackController};
pub use error::{PlaybackError, Result};
pub use types::{ControllerSnapshot, PlayerStatus, PlayingRoute, SessionId, SessionSnapshot};
