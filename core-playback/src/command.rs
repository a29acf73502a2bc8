//! Inbound calls, their typed form and the replies sent back.
//!
//! Hosts hand the controller a [`MethodCall`] exactly as it arrived on their
//! message channel. Argument maps are loosely typed: optional flags fall back
//! to their default when absent or of the wrong type, numbers are accepted as
//! integers or floats.

use crate::error::{PlaybackError, Result};
use crate::types::PlayingRoute;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A method invocation from the host message channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments: Some(arguments),
        }
    }
}

/// Successful reply to a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    /// The command was accepted (`1` on the wire).
    Ack,
    /// A duration or position in milliseconds.
    Millis(u64),
}

/// Outcome of one call. Every call gets exactly one.
pub type CallResult = Result<Reply>;

/// What the host sends back on its channel.
#[derive(Debug, Clone, PartialEq)]
pub enum WireReply {
    Value(Value),
    /// The host's own "method not implemented" marker.
    NotImplemented,
}

impl WireReply {
    /// `1` for acknowledgements, the number for queries, `0` for failures.
    pub fn from_result(result: &CallResult) -> Self {
        match result {
            Ok(Reply::Ack) => WireReply::Value(Value::from(1)),
            Ok(Reply::Millis(ms)) => WireReply::Value(Value::from(*ms)),
            Err(err) if err.is_not_implemented() => WireReply::NotImplemented,
            Err(_) => WireReply::Value(Value::from(0)),
        }
    }
}

/// Arguments of `play`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    pub url: String,
    pub is_local: bool,
    pub volume: f64,
    /// Start position in milliseconds.
    pub position: Option<i64>,
    /// Play as a notification sound that mixes with other audio.
    pub respect_silence: bool,
    pub recording_active: bool,
    pub duck_audio: bool,
}

/// Arguments of `setUrl`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub url: String,
    pub is_local: bool,
    pub respect_silence: bool,
    pub recording_active: bool,
}

/// Arguments of `setNotification`. Times are in seconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationRequest {
    pub title: Option<String>,
    pub album_title: Option<String>,
    pub artist: Option<String>,
    pub image_url: Option<String>,
    pub forward_skip_interval: i64,
    pub backward_skip_interval: i64,
    pub duration: Option<i64>,
    pub elapsed_time: i64,
    pub enable_previous_track_button: Option<bool>,
    pub enable_next_track_button: Option<bool>,
}

/// The closed set of commands the controller understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play(PlayRequest),
    Pause,
    Resume,
    Stop,
    Release,
    /// Absolute position in milliseconds; may be negative.
    Seek(i64),
    SetUrl(SourceRequest),
    SetVolume(f64),
    SetPlaybackRate(f64),
    SetReleaseMode { looping: bool },
    GetDuration,
    GetCurrentPosition,
    EarpieceOrSpeakersToggle(PlayingRoute),
    SetNotification(NotificationRequest),
    StartHeadlessService { handle: i64 },
    MonitorNotificationStateChanges { handle: i64 },
}

impl Command {
    /// Parse `method` with its argument map.
    ///
    /// Unknown methods yield [`PlaybackError::NotImplemented`]; missing or
    /// unusable required arguments yield a malformed-call error.
    pub fn parse(method: &str, args: &Map<String, Value>) -> Result<Self> {
        let args = Args(args);
        let command = match method {
            "play" => Command::Play(PlayRequest {
                url: args.required_str("url")?,
                is_local: args.flag("isLocal", true),
                volume: args.number("volume").unwrap_or(1.0),
                position: args.integer("position"),
                respect_silence: args.flag("respectSilence", false),
                recording_active: args.flag("recordingActive", false),
                duck_audio: args.flag("duckAudio", false),
            }),
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "stop" => Command::Stop,
            "release" => Command::Release,
            "seek" => Command::Seek(args.required_integer("position")?),
            "setUrl" => Command::SetUrl(SourceRequest {
                url: args.required_str("url")?,
                is_local: args.flag("isLocal", false),
                respect_silence: args.flag("respectSilence", false),
                recording_active: args.flag("recordingActive", false),
            }),
            "setVolume" => Command::SetVolume(args.required_number("volume")?),
            "setPlaybackRate" => Command::SetPlaybackRate(args.required_rate("playbackRate")?),
            "setReleaseMode" => {
                let mode = args.required_str("releaseMode")?;
                Command::SetReleaseMode {
                    looping: mode.ends_with("LOOP"),
                }
            }
            "getDuration" => Command::GetDuration,
            "getCurrentPosition" => Command::GetCurrentPosition,
            "earpieceOrSpeakersToggle" => Command::EarpieceOrSpeakersToggle(
                PlayingRoute::from_arg(&args.required_str("playingRoute")?),
            ),
            "setNotification" => Command::SetNotification(NotificationRequest {
                title: args.string("title"),
                album_title: args.string("albumTitle"),
                artist: args.string("artist"),
                image_url: args.string("imageUrl"),
                forward_skip_interval: args.integer("forwardSkipInterval").unwrap_or(0),
                backward_skip_interval: args.integer("backwardSkipInterval").unwrap_or(0),
                duration: args.integer("duration"),
                elapsed_time: args.integer("elapsedTime").unwrap_or(0),
                enable_previous_track_button: args.optional_bool("enablePreviousTrackButton"),
                enable_next_track_button: args.optional_bool("enableNextTrackButton"),
            }),
            "startHeadlessService" => Command::StartHeadlessService {
                handle: args.handle(&["handleKey", "handle"])?,
            },
            "monitorNotificationStateChanges" => Command::MonitorNotificationStateChanges {
                handle: args.handle(&["handleMonitorKey"])?,
            },
            other => return Err(PlaybackError::NotImplemented(other.to_string())),
        };
        Ok(command)
    }

    /// Method name this command was parsed from.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Stop => "stop",
            Command::Release => "release",
            Command::Seek(_) => "seek",
            Command::SetUrl(_) => "setUrl",
            Command::SetVolume(_) => "setVolume",
            Command::SetPlaybackRate(_) => "setPlaybackRate",
            Command::SetReleaseMode { .. } => "setReleaseMode",
            Command::GetDuration => "getDuration",
            Command::GetCurrentPosition => "getCurrentPosition",
            Command::EarpieceOrSpeakersToggle(_) => "earpieceOrSpeakersToggle",
            Command::SetNotification(_) => "setNotification",
            Command::StartHeadlessService { .. } => "startHeadlessService",
            Command::MonitorNotificationStateChanges { .. } => "monitorNotificationStateChanges",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed view over a loosely typed argument map.
struct Args<'a>(&'a Map<String, Value>);

impl Args<'_> {
    fn required_str(&self, name: &'static str) -> Result<String> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(PlaybackError::MissingParameter(name)),
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(PlaybackError::invalid(name, "expected a string")),
        }
    }

    fn required_number(&self, name: &'static str) -> Result<f64> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(PlaybackError::MissingParameter(name)),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| PlaybackError::invalid(name, "expected a number")),
        }
    }

    /// Rates must be finite and positive.
    fn required_rate(&self, name: &'static str) -> Result<f64> {
        let rate = self.required_number(name)?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlaybackError::invalid(
                name,
                format!("{rate} is not a positive rate"),
            ));
        }
        Ok(rate)
    }

    fn required_integer(&self, name: &'static str) -> Result<i64> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(PlaybackError::MissingParameter(name)),
            Some(value) => as_integer(value)
                .ok_or_else(|| PlaybackError::invalid(name, "expected an integer")),
        }
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    fn integer(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(as_integer)
    }

    fn optional_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    fn flag(&self, name: &str, default: bool) -> bool {
        self.optional_bool(name).unwrap_or(default)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_owned)
    }

    /// Callback handle under the first present key, given as `[i64, ...]` or
    /// a bare integer.
    fn handle(&self, names: &[&'static str]) -> Result<i64> {
        let Some((name, value)) = names
            .iter()
            .find_map(|name| self.0.get(*name).filter(|v| !v.is_null()).map(|v| (*name, v)))
        else {
            return Err(PlaybackError::MissingParameter(names[0]));
        };

        let handle = match value {
            Value::Array(items) => items.first().and_then(as_integer),
            other => as_integer(other),
        };
        handle.ok_or_else(|| PlaybackError::invalid(name, "expected an integer handle"))
    }
}

/// Integers, or floats with no fractional part.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}
