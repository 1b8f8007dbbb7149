//! Playback port abstraction.
//!
//! The renderer never decodes audio itself. It drives a [`PlaybackPort`] that plays one
//! source at a time and later reports lifecycle events for that source through a
//! [`PlaybackObserver`], usually from the port's own thread.

use std::sync::Arc;

use anyhow::Result;

use alert_types::{AudioSource, PlaybackErrorKind, SourceId};

/// Media player driven by the renderer.
///
/// For every identifier returned by [`PlaybackPort::play`] the port delivers one of
/// started→finished, started→error, or a bare error, plus a stopped event when a
/// [`PlaybackPort::stop`] request cancels it.
pub trait PlaybackPort: Send + Sync {
    /// Register where lifecycle callbacks are delivered.
    fn set_observer(&self, observer: Arc<dyn PlaybackObserver>);

    /// Begin asynchronous playback and return immediately with an identifier.
    fn play(&self, source: &AudioSource) -> Result<SourceId>;

    /// Request cancellation of a play request.
    ///
    /// Eventually yields a stopped or finished callback for `id`, or nothing if it
    /// already completed.
    fn stop(&self, id: SourceId) -> Result<()>;
}

/// Lifecycle callbacks emitted by a playback port.
pub trait PlaybackObserver: Send + Sync {
    fn on_playback_started(&self, id: SourceId);

    fn on_playback_stopped(&self, id: SourceId);

    fn on_playback_finished(&self, id: SourceId);

    fn on_playback_error(&self, id: SourceId, kind: PlaybackErrorKind, message: String);
}
