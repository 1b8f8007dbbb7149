//! Alert audio rendering engine.
//!
//! Plays an alert's remote audio sequence (optionally looping), falls back to local audio
//! when remote playback fails, and reports lifecycle state to an observer. Actual decoding
//! and output are delegated to a [`playback::PlaybackPort`].
//!
//! ## Threading
//! Every public call and every playback callback is queued onto a single worker thread
//! ([`executor::Executor`]); only that thread touches session state.

pub mod config;
pub mod executor;
pub mod observer;
pub mod playback;
pub mod renderer;

pub use alert_types::{
    AudioSource, PlaybackErrorKind, RendererNotification, RendererPhase, RendererState,
    RendererStatus, SourceId,
};
pub use config::{AlertAudioConfig, RenderRequest, RendererConfig, render_request_from_config};
pub use observer::RendererObserver;
pub use playback::{PlaybackObserver, PlaybackPort};
pub use renderer::{PlaybackEvents, Renderer};
