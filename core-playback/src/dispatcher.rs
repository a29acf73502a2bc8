//! Validation of inbound calls before any session is touched.
//!
//! A call is routed only once it names a session, a known method, every
//! required argument and a capability this platform has. Anything else is
//! answered synchronously and leaves the registry untouched.

use crate::command::{Command, MethodCall};
use crate::error::{PlaybackError, Result};
use crate::types::SessionId;

/// Optional host capabilities a command may need.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Capabilities {
    pub now_playing: bool,
    pub headless: bool,
}

/// Resolve `call` to its target session and typed command.
pub(crate) fn route(call: &MethodCall, capabilities: Capabilities) -> Result<(SessionId, Command)> {
    let args = call
        .arguments
        .as_ref()
        .and_then(|value| value.as_object())
        .ok_or(PlaybackError::MissingParameter("playerId"))?;

    let session = args
        .get("playerId")
        .and_then(|value| value.as_str())
        .map(SessionId::from)
        .ok_or(PlaybackError::MissingParameter("playerId"))?;

    let command = Command::parse(&call.method, args)?;

    let supported = match command {
        Command::SetNotification(_) => capabilities.now_playing,
        Command::StartHeadlessService { .. } | Command::MonitorNotificationStateChanges { .. } => {
            capabilities.headless
        }
        _ => true,
    };
    if !supported {
        return Err(PlaybackError::NotImplemented(call.method.clone()));
    }

    Ok((session, command))
}
