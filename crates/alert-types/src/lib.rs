use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque identifier handed out by a playback port for one play request.
///
/// The renderer only compares identifiers for equality; it never interprets the value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One thing a playback port can be asked to play.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum AudioSource {
    /// Local audio file, expected to be playable without network access.
    File(PathBuf),
    /// Remote audio addressed by URL.
    Url(String),
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::File(path) => write!(f, "{}", path.display()),
            AudioSource::Url(url) => f.write_str(url),
        }
    }
}

/// High-level renderer state reported to observers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RendererState {
    /// Audio for the alert became audible for the first time in this session.
    Started,
    /// Rendering ended because it was stopped.
    Stopped,
    /// Rendering ran to its natural end.
    Finished,
    /// Rendering ended because even the fallback audio could not be played.
    Error,
}

impl fmt::Display for RendererState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RendererState::Started => "STARTED",
            RendererState::Stopped => "STOPPED",
            RendererState::Finished => "FINISHED",
            RendererState::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Observer payload: a state plus an optional human-readable message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RendererNotification {
    pub state: RendererState,
    /// Empty unless the transition carries detail (for example an error description).
    pub message: String,
}

/// Category of a playback failure reported by a playback port.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    /// An unknown error occurred.
    MediaErrorUnknown,
    /// The server recognized the request as malformed (bad request, unauthorized, forbidden...).
    InvalidRequest,
    /// The client was unable to reach the service.
    ServiceUnavailable,
    /// The server accepted the request but could not process it.
    InternalServerError,
    /// There was an internal error on the client.
    InternalDeviceError,
}

impl fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackErrorKind::MediaErrorUnknown => "MEDIA_ERROR_UNKNOWN",
            PlaybackErrorKind::InvalidRequest => "MEDIA_ERROR_INVALID_REQUEST",
            PlaybackErrorKind::ServiceUnavailable => "MEDIA_ERROR_SERVICE_UNAVAILABLE",
            PlaybackErrorKind::InternalServerError => "MEDIA_ERROR_INTERNAL_SERVER_ERROR",
            PlaybackErrorKind::InternalDeviceError => "MEDIA_ERROR_INTERNAL_DEVICE_ERROR",
        };
        f.write_str(name)
    }
}

/// Where the renderer's state machine currently is.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RendererPhase {
    /// Nothing has been rendered yet.
    #[default]
    Idle,
    /// Playing one of the remote sources.
    PlayingSequence,
    /// Playing the local fallback audio.
    PlayingFallback,
    /// Waiting out the pause between two passes over the sequence.
    PausedBetweenLoops,
    /// A stop was issued and the player has not acknowledged it yet.
    Stopping,
    /// The last session reached a terminal state.
    Done,
}

/// Point-in-time view of the renderer, suitable for status endpoints and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RendererStatus {
    pub phase: RendererPhase,
    /// Identifier of the outstanding play request, if any.
    pub active_source: Option<SourceId>,
    /// Index of the next remote source to attempt.
    pub next_index: usize,
    /// Number of URLs in the current session's sequence.
    pub sequence_len: usize,
    /// Full passes over the sequence completed so far.
    pub passes_completed: u32,
    pub stop_requested: bool,
}
