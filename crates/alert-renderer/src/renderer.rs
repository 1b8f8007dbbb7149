//! Alert audio renderer.
//!
//! Plays an alert's remote URLs in order, optionally looping over them, and falls back to
//! a local file when remote playback fails. All session state lives on one executor
//! worker; public calls and playback callbacks are queued onto it, so no locks are needed.
//!
//! Every play request yields a [`SourceId`]. Only callbacks carrying the id of the
//! outstanding request are acted upon; anything else belongs to a superseded or finished
//! session and is dropped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::Sender;

use alert_types::{PlaybackErrorKind, RendererPhase, RendererState, RendererStatus, SourceId};

use crate::config::{RenderRequest, RendererConfig};
use crate::executor::{Executor, Submitter, TimerId, Timers, Worker};
use crate::observer::RendererObserver;
use crate::playback::{PlaybackObserver, PlaybackPort};

/// Work items processed by the renderer's worker.
pub(crate) enum RendererTask {
    SetObserver(Option<Arc<dyn RendererObserver>>),
    Start(RenderRequest),
    Stop,
    PlaybackStarted(SourceId),
    PlaybackStopped(SourceId),
    PlaybackFinished(SourceId),
    PlaybackError {
        id: SourceId,
        kind: PlaybackErrorKind,
        message: String,
    },
    /// Fired by the loop pause timer of the session with this generation.
    ResumeLoop {
        generation: u64,
    },
    Status(Sender<RendererStatus>),
}

/// Handle to a running alert renderer.
///
/// All methods return immediately; the work happens on the renderer's worker thread.
/// Dropping the handle drains pending work and stops the worker.
pub struct Renderer {
    executor: Executor<RendererTask>,
}

/// Playback callback sink that feeds a renderer's queue.
///
/// Cloneable and cheap; hand it to whatever thread delivers playback events.
#[derive(Clone)]
pub struct PlaybackEvents {
    submitter: Submitter<RendererTask>,
}

impl PlaybackEvents {
    fn submit(&self, task: RendererTask) {
        if !self.submitter.submit(task) {
            tracing::debug!("alert renderer stopped; dropping playback callback");
        }
    }
}

impl PlaybackObserver for PlaybackEvents {
    fn on_playback_started(&self, id: SourceId) {
        self.submit(RendererTask::PlaybackStarted(id));
    }

    fn on_playback_stopped(&self, id: SourceId) {
        self.submit(RendererTask::PlaybackStopped(id));
    }

    fn on_playback_finished(&self, id: SourceId) {
        self.submit(RendererTask::PlaybackFinished(id));
    }

    fn on_playback_error(&self, id: SourceId, kind: PlaybackErrorKind, message: String) {
        self.submit(RendererTask::PlaybackError { id, kind, message });
    }
}

impl Renderer {
    /// Spawn the renderer worker and register it as `player`'s observer.
    pub fn spawn(player: Arc<dyn PlaybackPort>, config: &RendererConfig) -> Result<Self> {
        let core = RendererCore::new(player.clone());
        let executor = Executor::spawn(&config.thread_name, core)?;
        let renderer = Self { executor };
        player.set_observer(Arc::new(renderer.playback_events()));
        Ok(renderer)
    }

    /// Replace the observer; `None` silences notifications.
    pub fn set_observer(&self, observer: Option<Arc<dyn RendererObserver>>) {
        self.enqueue(RendererTask::SetObserver(observer));
    }

    /// Start rendering `request`, superseding any session in progress.
    pub fn start(&self, request: RenderRequest) {
        self.enqueue(RendererTask::Start(request));
    }

    /// Ask the current session to stop.
    ///
    /// The observer hears `Stopped` once the player confirms. No-op when idle.
    pub fn stop(&self) {
        self.enqueue(RendererTask::Stop);
    }

    /// Callback sink for playback ports other than the one passed to [`Renderer::spawn`].
    pub fn playback_events(&self) -> PlaybackEvents {
        PlaybackEvents {
            submitter: self.executor.submitter(),
        }
    }

    /// Snapshot of the state machine, taken after all previously queued work.
    pub fn status(&self, timeout: Duration) -> Option<RendererStatus> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        if !self.executor.submit(RendererTask::Status(reply_tx)) {
            return None;
        }
        reply_rx.recv_timeout(timeout).ok()
    }

    /// Wait until everything queued before this call has been processed.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.executor.flush(timeout)
    }

    /// Drain pending work and stop the worker.
    pub fn shutdown(mut self) {
        self.executor.shutdown();
    }

    fn enqueue(&self, task: RendererTask) {
        if !self.executor.submit(task) {
            tracing::warn!("alert renderer worker is gone; dropping request");
        }
    }
}

/// Configuration and progress of one rendering session.
struct Session {
    request: RenderRequest,
    generation: u64,
    next_index: usize,
    passes_completed: u32,
    stop_requested: bool,
    /// Outstanding play request; `None` while nothing is outstanding.
    active: Option<SourceId>,
    started_notified: bool,
    resume_timer: Option<TimerId>,
}

impl Session {
    fn new(request: RenderRequest, generation: u64) -> Self {
        Self {
            request,
            generation,
            next_index: 0,
            passes_completed: 0,
            stop_requested: false,
            active: None,
            started_notified: false,
            resume_timer: None,
        }
    }
}

/// Worker-owned renderer state.
struct RendererCore {
    player: Arc<dyn PlaybackPort>,
    observer: Option<Arc<dyn RendererObserver>>,
    phase: RendererPhase,
    session: Option<Session>,
    generation: u64,
}

impl Worker for RendererCore {
    type Task = RendererTask;

    fn handle(&mut self, task: RendererTask, timers: &mut Timers<RendererTask>) {
        match task {
            RendererTask::SetObserver(observer) => self.observer = observer,
            RendererTask::Start(request) => self.execute_start(request, timers),
            RendererTask::Stop => self.execute_stop(timers),
            RendererTask::PlaybackStarted(id) => self.execute_on_playback_started(id),
            RendererTask::PlaybackStopped(id) => self.execute_on_playback_stopped(id, timers),
            RendererTask::PlaybackFinished(id) => self.execute_on_playback_finished(id, timers),
            RendererTask::PlaybackError { id, kind, message } => {
                self.execute_on_playback_error(id, kind, &message, timers)
            }
            RendererTask::ResumeLoop { generation } => self.execute_resume_loop(generation, timers),
            RendererTask::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }
}

impl RendererCore {
    fn new(player: Arc<dyn PlaybackPort>) -> Self {
        Self {
            player,
            observer: None,
            phase: RendererPhase::Idle,
            session: None,
            generation: 0,
        }
    }

    fn execute_start(&mut self, request: RenderRequest, timers: &mut Timers<RendererTask>) {
        if let Some(previous) = self.session.take() {
            self.supersede(previous, timers);
        }
        self.generation = self.generation.wrapping_add(1);
        tracing::info!(
            fallback = %request.fallback.display(),
            urls = request.urls.len(),
            loop_count = request.loop_count,
            loop_pause_ms = request.loop_pause.as_millis() as u64,
            "alert render start"
        );

        let has_urls = !request.urls.is_empty();
        self.session = Some(Session::new(request, self.generation));
        if has_urls {
            self.play_sequence_item(timers);
        } else {
            self.play_fallback("no urls to render", timers);
        }
    }

    /// Abandon a session without waiting for the player; its id becomes stale.
    fn supersede(&mut self, previous: Session, timers: &mut Timers<RendererTask>) {
        if let Some(timer) = previous.resume_timer {
            timers.cancel(timer);
        }
        let Some(id) = previous.active else {
            tracing::debug!(phase = ?self.phase, "superseding alert session with nothing outstanding");
            return;
        };
        if previous.stop_requested {
            tracing::debug!(source_id = %id, "superseding alert session already being stopped");
            return;
        }
        tracing::debug!(source_id = %id, phase = ?self.phase, "superseding active alert session");
        if let Err(e) = self.player.stop(id) {
            tracing::warn!(source_id = %id, "stop of superseded playback failed: {e:#}");
        }
    }

    fn execute_stop(&mut self, timers: &mut Timers<RendererTask>) {
        match self.phase {
            RendererPhase::PlayingSequence | RendererPhase::PlayingFallback => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let Some(id) = session.active else {
                    return;
                };
                session.stop_requested = true;
                self.phase = RendererPhase::Stopping;
                tracing::info!(source_id = %id, "stopping alert audio");
                if let Err(e) = self.player.stop(id) {
                    tracing::warn!(source_id = %id, "stop request failed: {e:#}");
                    self.finish(RendererState::Error, &format!("stop failed: {e:#}"), timers);
                }
            }
            RendererPhase::PausedBetweenLoops => {
                // Nothing is outstanding, so there is no acknowledgement to wait for.
                self.finish(RendererState::Stopped, "", timers);
            }
            RendererPhase::Stopping | RendererPhase::Idle | RendererPhase::Done => {
                tracing::debug!(phase = ?self.phase, "stop ignored");
            }
        }
    }

    fn execute_on_playback_started(&mut self, id: SourceId) {
        if !self.accepts(id) {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.started_notified {
            return;
        }
        session.started_notified = true;
        self.notify(RendererState::Started, "");
    }

    fn execute_on_playback_stopped(&mut self, id: SourceId, timers: &mut Timers<RendererTask>) {
        if !self.accepts(id) {
            return;
        }
        let requested = self.session.as_ref().is_some_and(|s| s.stop_requested);
        let message = if requested { "" } else { "stopped by player" };
        self.finish(RendererState::Stopped, message, timers);
    }

    fn execute_on_playback_finished(&mut self, id: SourceId, timers: &mut Timers<RendererTask>) {
        if !self.accepts(id) {
            return;
        }
        match self.phase {
            RendererPhase::Stopping => self.finish(RendererState::Stopped, "", timers),
            RendererPhase::PlayingFallback => self.finish(RendererState::Finished, "", timers),
            RendererPhase::PlayingSequence => self.advance_sequence(timers),
            phase => tracing::warn!(source_id = %id, phase = ?phase, "finished callback in unexpected phase"),
        }
    }

    fn execute_on_playback_error(
        &mut self,
        id: SourceId,
        kind: PlaybackErrorKind,
        message: &str,
        timers: &mut Timers<RendererTask>,
    ) {
        if !self.accepts(id) {
            return;
        }
        tracing::warn!(
            source_id = %id,
            kind = %kind,
            detail = message,
            phase = ?self.phase,
            "alert playback error"
        );
        match self.phase {
            RendererPhase::PlayingSequence => self.play_fallback(message, timers),
            RendererPhase::Stopping => self.finish(RendererState::Stopped, "", timers),
            _ => self.finish(RendererState::Error, &format!("{kind}: {message}"), timers),
        }
    }

    fn execute_resume_loop(&mut self, generation: u64, timers: &mut Timers<RendererTask>) {
        let paused = self.phase == RendererPhase::PausedBetweenLoops;
        let current = self
            .session
            .as_mut()
            .filter(|s| paused && s.generation == generation);
        let Some(session) = current else {
            tracing::debug!(generation, "dropping stale loop resumption");
            return;
        };
        session.resume_timer = None;
        session.next_index = 0;
        tracing::debug!(pass = session.passes_completed + 1, "resuming alert url sequence");
        self.play_sequence_item(timers);
    }

    /// Move past a finished URL: next URL, next pass, or done.
    fn advance_sequence(&mut self, timers: &mut Timers<RendererTask>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.active = None;
        session.next_index += 1;
        if session.next_index < session.request.urls.len() {
            self.play_sequence_item(timers);
            return;
        }

        session.passes_completed += 1;
        if session.passes_completed > session.request.loop_count {
            self.finish(RendererState::Finished, "", timers);
            return;
        }

        let pause = session.request.loop_pause;
        if pause.is_zero() {
            session.next_index = 0;
            self.play_sequence_item(timers);
            return;
        }
        let generation = session.generation;
        session.resume_timer = Some(timers.schedule(pause, RendererTask::ResumeLoop { generation }));
        tracing::debug!(
            passes_completed = session.passes_completed,
            pause_ms = pause.as_millis() as u64,
            "pausing between alert loops"
        );
        self.phase = RendererPhase::PausedBetweenLoops;
    }

    fn play_sequence_item(&mut self, timers: &mut Timers<RendererTask>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let index = session.next_index;
        let Some(source) = session.request.url_source(index) else {
            self.play_fallback("url sequence exhausted", timers);
            return;
        };
        self.phase = RendererPhase::PlayingSequence;
        match self.player.play(&source) {
            Ok(id) => {
                tracing::info!(url = %source, index, source_id = %id, "playing alert url");
                session.active = Some(id);
            }
            Err(e) => {
                tracing::warn!(url = %source, index, "alert url play failed: {e:#}");
                self.play_fallback(&format!("{e:#}"), timers);
            }
        }
    }

    /// Abandon the rest of the sequence and play the local fallback once.
    fn play_fallback(&mut self, reason: &str, timers: &mut Timers<RendererTask>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.active = None;
        let source = session.request.fallback_source();
        self.phase = RendererPhase::PlayingFallback;
        match self.player.play(&source) {
            Ok(id) => {
                tracing::info!(path = %source, reason, source_id = %id, "playing fallback alert audio");
                session.active = Some(id);
            }
            Err(e) => {
                tracing::warn!(path = %source, "fallback play failed: {e:#}");
                self.finish(
                    RendererState::Error,
                    &format!("fallback playback failed: {e:#}"),
                    timers,
                );
            }
        }
    }

    /// End the session: drop progress, cancel the loop timer, notify.
    fn finish(&mut self, state: RendererState, message: &str, timers: &mut Timers<RendererTask>) {
        if let Some(session) = self.session.take() {
            if let Some(timer) = session.resume_timer {
                timers.cancel(timer);
            }
        }
        self.phase = RendererPhase::Done;
        self.notify(state, message);
    }

    fn accepts(&self, id: SourceId) -> bool {
        let active = self.session.as_ref().and_then(|s| s.active);
        if active == Some(id) {
            return true;
        }
        tracing::trace!(source_id = %id, active = ?active, "dropping stale playback callback");
        false
    }

    fn notify(&self, state: RendererState, message: &str) {
        tracing::info!(state = %state, detail = message, "alert renderer state change");
        if let Some(observer) = self.observer.as_ref() {
            observer.on_renderer_state_change(state, message);
        }
    }

    fn status(&self) -> RendererStatus {
        match self.session.as_ref() {
            Some(session) => RendererStatus {
                phase: self.phase,
                active_source: session.active,
                next_index: session.next_index,
                sequence_len: session.request.urls.len(),
                passes_completed: session.passes_completed,
                stop_requested: session.stop_requested,
            },
            None => RendererStatus {
                phase: self.phase,
                ..RendererStatus::default()
            },
        }
    }
}
