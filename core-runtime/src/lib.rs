//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge injection
//! - Outbound player events and the event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the controller and the
//! service façade depend on. It establishes the logging conventions, the
//! fail-fast capability checks and the event broadcasting mechanism shared
//! by the rest of the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
