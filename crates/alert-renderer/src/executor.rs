//! Serial task executor.
//!
//! A single worker thread owns some mutable state and drains a FIFO of tasks for it:
//! - any number of producers submit tasks through [`Executor::submit`] or a [`Submitter`]
//! - tasks run strictly one at a time, in the order they were enqueued
//! - the worker may schedule delayed tasks ([`Timers`]); a due task is appended to the
//!   queue at its deadline and runs on the same thread behind work already waiting
//!
//! Because nothing but the worker ever touches the state, the state needs no locking.
//! Shutdown is deterministic: a marker is queued behind pending tasks, the worker
//! processes everything before it, drops its state, and the owner joins the thread.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};

/// State owned by an executor's worker thread.
pub trait Worker: Send + 'static {
    /// Message type accepted by this worker.
    type Task: Send + 'static;

    /// Run one task. Never called concurrently with itself.
    fn handle(&mut self, task: Self::Task, timers: &mut Timers<Self::Task>);
}

enum Envelope<T> {
    Task(T),
    Flush(Sender<()>),
    Shutdown,
}

/// Identifies a delayed task so it can be cancelled before it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct PendingTimer<T> {
    id: TimerId,
    deadline: Instant,
    task: T,
}

/// Delayed tasks owned by the worker thread.
///
/// When a timer comes due its task is appended to the queue, so it runs after tasks
/// enqueued before the deadline and ahead of anything enqueued later.
pub struct Timers<T> {
    next_id: u64,
    pending: Vec<PendingTimer<T>>,
}

impl<T> Timers<T> {
    fn new() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Run `task` on the worker once `delay` has elapsed.
    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = TimerId(self.next_id);
        self.pending.push(PendingTimer {
            id,
            deadline: Instant::now() + delay,
            task,
        });
        id
    }

    /// Drop a timer that has not fired yet.
    ///
    /// Returns `false` if the timer was already queued or cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|t| t.id != id);
        self.pending.len() != before
    }

    /// Number of timers that have not fired yet.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.deadline).min()
    }

    /// Remove and return every task whose deadline is at or before `now`,
    /// earliest deadline first (ties in scheduling order).
    fn take_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|t| (t.deadline, t.id.0));
        due.into_iter().map(|t| t.task).collect()
    }
}

/// Cloneable producer handle for an executor's queue.
pub struct Submitter<T> {
    tx: Sender<Envelope<T>>,
}

impl<T> Clone for Submitter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> Submitter<T> {
    /// Enqueue a task. Returns `false` if the worker has already shut down.
    pub fn submit(&self, task: T) -> bool {
        self.tx.send(Envelope::Task(task)).is_ok()
    }
}

/// Owner of a serial worker thread.
///
/// Dropping the executor shuts the worker down after it drains pending tasks.
pub struct Executor<T> {
    name: String,
    tx: Sender<Envelope<T>>,
    join: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Executor<T> {
    /// Spawn a named worker thread that owns `worker`.
    pub fn spawn<W>(name: &str, worker: W) -> Result<Self>
    where
        W: Worker<Task = T>,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_name = name.to_string();
        let join = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn({
                let tx = tx.clone();
                move || run_worker(thread_name, worker, tx, rx)
            })
            .with_context(|| format!("spawn executor thread {name}"))?;
        Ok(Self {
            name: name.to_string(),
            tx,
            join: Some(join),
        })
    }

    /// Enqueue a task. Returns `false` if the worker has already shut down.
    pub fn submit(&self, task: T) -> bool {
        self.tx.send(Envelope::Task(task)).is_ok()
    }

    /// Producer handle that can be moved to other threads.
    pub fn submitter(&self) -> Submitter<T> {
        Submitter {
            tx: self.tx.clone(),
        }
    }

    /// Block until every task enqueued before this call has run.
    ///
    /// Returns `false` on timeout or if the worker is gone.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Envelope::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

impl<T> Executor<T> {
    /// Stop the worker after it processes everything already queued, then join it.
    ///
    /// Idempotent. When called from the worker thread itself the join is skipped.
    pub fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.tx.send(Envelope::Shutdown);
        if join.thread().id() == std::thread::current().id() {
            tracing::warn!(
                executor = %self.name,
                "shutdown requested from worker thread; not joining"
            );
            return;
        }
        if join.join().is_err() {
            tracing::warn!(executor = %self.name, "executor worker panicked");
        }
    }
}

impl<T> Drop for Executor<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop: drain the queue in order, appending due timers to it between tasks.
fn run_worker<W: Worker>(
    name: String,
    mut worker: W,
    tx: Sender<Envelope<W::Task>>,
    rx: Receiver<Envelope<W::Task>>,
) {
    tracing::debug!(executor = %name, "executor worker started");
    let mut timers = Timers::new();

    loop {
        for task in timers.take_due(Instant::now()) {
            // Cannot fail: this thread holds the receiver.
            let _ = tx.send(Envelope::Task(task));
        }

        let envelope = match timers.next_deadline() {
            Some(deadline) => {
                let timeout = crossbeam_channel::at(deadline);
                crossbeam_channel::select_biased! {
                    recv(rx) -> msg => {
                        let Ok(envelope) = msg else { break };
                        Some(envelope)
                    }
                    recv(timeout) -> _ => None,
                }
            }
            None => {
                let Ok(envelope) = rx.recv() else { break };
                Some(envelope)
            }
        };

        match envelope {
            Some(Envelope::Task(task)) => worker.handle(task, &mut timers),
            Some(Envelope::Flush(ack)) => {
                let _ = ack.send(());
            }
            Some(Envelope::Shutdown) => break,
            None => {}
        }
    }

    if !timers.is_empty() {
        tracing::debug!(executor = %name, pending = timers.len(), "dropping pending timers");
    }
    tracing::debug!(executor = %name, "executor worker exited");
}
