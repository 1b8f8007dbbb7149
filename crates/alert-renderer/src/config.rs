//! Renderer settings and alert audio definitions.
//!
//! Alert audio can be described in TOML and resolved into a [`RenderRequest`]:
//!
//! ```toml
//! fallback = "/usr/share/sounds/alarm.wav"
//! urls = ["https://example.com/alarm-intro.mp3", "https://example.com/alarm-loop.mp3"]
//! loop_count = 2
//! loop_pause_ms = 1500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use alert_types::AudioSource;

/// Runtime settings for a renderer instance.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Name of the renderer's worker thread.
    pub thread_name: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            thread_name: "alert-renderer".to_string(),
        }
    }
}

/// What to render for one alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    /// Local audio that is always playable; used when the URLs are empty or fail.
    pub fallback: PathBuf,
    /// Remote sources played in order.
    pub urls: Vec<String>,
    /// How many times the URL sequence is replayed after the first pass.
    pub loop_count: u32,
    /// Pause between two passes over the URL sequence.
    pub loop_pause: Duration,
}

impl RenderRequest {
    /// Render only `fallback`, once.
    pub fn new(fallback: impl Into<PathBuf>) -> Self {
        Self {
            fallback: fallback.into(),
            urls: Vec::new(),
            loop_count: 0,
            loop_pause: Duration::ZERO,
        }
    }

    pub fn with_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_loop(mut self, loop_count: u32, loop_pause: Duration) -> Self {
        self.loop_count = loop_count;
        self.loop_pause = loop_pause;
        self
    }

    pub(crate) fn fallback_source(&self) -> AudioSource {
        AudioSource::File(self.fallback.clone())
    }

    pub(crate) fn url_source(&self, index: usize) -> Option<AudioSource> {
        self.urls.get(index).cloned().map(AudioSource::Url)
    }
}

/// Alert audio definition as written in TOML.
#[derive(Debug, Default, Deserialize)]
pub struct AlertAudioConfig {
    /// Local fallback audio file.
    pub fallback: Option<String>,
    /// Remote audio URLs played in order.
    pub urls: Option<Vec<String>>,
    /// Extra passes over `urls` after the first.
    pub loop_count: Option<u32>,
    /// Pause between passes in milliseconds.
    pub loop_pause_ms: Option<u64>,
}

impl AlertAudioConfig {
    /// Load an alert audio definition from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read alert audio config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse alert audio config {:?}", path))
    }

    /// Parse an alert audio definition from a TOML string.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<AlertAudioConfig>(raw)?)
    }
}

/// Resolve a config into a request, requiring a fallback and dropping blank URLs.
pub fn render_request_from_config(cfg: &AlertAudioConfig) -> Result<RenderRequest> {
    let fallback = cfg
        .fallback
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("fallback is required in alert audio config"))?;
    let urls = cfg
        .urls
        .iter()
        .flatten()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    Ok(RenderRequest::new(fallback).with_urls(urls).with_loop(
        cfg.loop_count.unwrap_or(0),
        Duration::from_millis(cfg.loop_pause_ms.unwrap_or(0)),
    ))
}
