//! # Playback Error Types
//!
//! Failures reported to callers of the playback controller.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur while handling a controller call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Malformed Calls
    // ========================================================================
    /// A required argument (or the session id) was absent.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// An argument was present but unusable.
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// Unknown method, or a capability this platform does not provide.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine could not be opened or rejected a request.
    #[error("Engine error: {0}")]
    Engine(String),

    /// A pending load was abandoned before it finished.
    #[error("Load superseded: {0}")]
    Superseded(String),

    // ========================================================================
    // Controller Errors
    // ========================================================================
    /// The controller task has stopped.
    #[error("Playback controller closed")]
    ControllerClosed,

    /// Controller settings failed validation.
    #[error("Invalid controller configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Returns `true` if the call was rejected before touching any session.
    pub fn is_malformed_call(&self) -> bool {
        matches!(
            self,
            PlaybackError::MissingParameter(_) | PlaybackError::InvalidArgument { .. }
        )
    }

    /// Returns `true` if the host should answer with its "not implemented"
    /// marker instead of a failure code.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, PlaybackError::NotImplemented(_))
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PlaybackError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        PlaybackError::Engine(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
