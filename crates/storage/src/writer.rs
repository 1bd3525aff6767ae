//! Asynchronous event log writer.
//!
//! The writer owns a bounded queue and a single background worker that
//! appends queued events to a backend in FIFO order. It starts inert
//! ([`WriterMode::Replaying`]) and only accepts events once replay has handed
//! it the backend.
//!
//! The worker is fail-stop: the first append error is published on the
//! [`ErrorSignal`] and the worker exits. Nothing is retried.

use crate::backend::EventLogBackend;
use crate::{Error, EventKind, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Maximum number of events waiting for the worker.
pub const QUEUE_CAPACITY: usize = 16;

/// Lifecycle of a writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterMode {
    /// Waiting for replay to finish; writes are rejected.
    Replaying,
    /// Accepting events.
    Live,
    /// Drained and shut down.
    Closed,
}

impl std::fmt::Display for WriterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterMode::Replaying => f.write_str("replaying"),
            WriterMode::Live => f.write_str("live"),
            WriterMode::Closed => f.write_str("closed"),
        }
    }
}

struct Pending {
    kind: EventKind,
    key: String,
    value: String,
}

enum State {
    Replaying,
    Live {
        tx: mpsc::Sender<Pending>,
        worker: JoinHandle<u64>,
    },
    Closed,
}

/// Receiving end of the writer's error slot. At most one error is ever
/// published.
#[derive(Debug, Clone)]
pub struct ErrorSignal {
    rx: watch::Receiver<Option<Arc<Error>>>,
}

impl ErrorSignal {
    /// The published error, if any, without waiting.
    pub fn try_get(&self) -> Option<Arc<Error>> {
        (*self.rx.borrow()).clone()
    }

    /// Wait for the worker to fail.
    ///
    /// Returns `None` if the worker shut down cleanly instead.
    pub async fn wait(&mut self) -> Option<Arc<Error>> {
        self.rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|slot| (*slot).clone())
    }
}

/// Queues mutations and persists them on a background worker.
pub struct EventLogWriter {
    state: State,
    errors_tx: Option<watch::Sender<Option<Arc<Error>>>>,
    errors_rx: watch::Receiver<Option<Arc<Error>>>,
}

impl Default for EventLogWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogWriter {
    /// Create an inert writer in [`WriterMode::Replaying`].
    pub fn new() -> Self {
        let (errors_tx, errors_rx) = watch::channel(None);
        Self {
            state: State::Replaying,
            errors_tx: Some(errors_tx),
            errors_rx,
        }
    }

    pub fn mode(&self) -> WriterMode {
        match self.state {
            State::Replaying => WriterMode::Replaying,
            State::Live { .. } => WriterMode::Live,
            State::Closed => WriterMode::Closed,
        }
    }

    /// Take ownership of `backend` and start the background worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn go_live(&mut self, backend: Box<dyn EventLogBackend>) -> Result<()> {
        if !matches!(self.state, State::Replaying) {
            return Err(Error::AlreadyLive);
        }
        let errors_tx = self.errors_tx.take().ok_or(Error::AlreadyLive)?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::task::spawn_blocking(move || run_worker(backend, rx, errors_tx));
        self.state = State::Live { tx, worker };
        tracing::debug!(capacity = QUEUE_CAPACITY, "event log writer live");
        Ok(())
    }

    /// Queue a put. Waits only while the queue is full.
    pub async fn write_put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.enqueue(Pending {
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        })
        .await
    }

    /// Queue a delete. Waits only while the queue is full.
    pub async fn write_delete(&self, key: impl Into<String>) -> Result<()> {
        self.enqueue(Pending {
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        })
        .await
    }

    async fn enqueue(&self, pending: Pending) -> Result<()> {
        match &self.state {
            State::Live { tx, .. } => tx.send(pending).await.map_err(|_| Error::WriterStopped),
            State::Replaying => Err(Error::NotLive),
            State::Closed => Err(Error::WriterStopped),
        }
    }

    /// The single-slot error signal of the background worker.
    pub fn errors(&self) -> ErrorSignal {
        ErrorSignal {
            rx: self.errors_rx.clone(),
        }
    }

    /// Stop accepting events, wait for the queue to drain and join the worker.
    ///
    /// Returns how many events the worker appended over its lifetime.
    pub async fn close(&mut self) -> Result<u64> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Live { tx, worker } => {
                drop(tx);
                worker.await.map_err(|_| Error::WriterStopped)
            }
            State::Replaying | State::Closed => Ok(0),
        }
    }
}

fn run_worker(
    mut backend: Box<dyn EventLogBackend>,
    mut rx: mpsc::Receiver<Pending>,
    errors: watch::Sender<Option<Arc<Error>>>,
) -> u64 {
    let mut appended = 0;

    while let Some(pending) = rx.blocking_recv() {
        match backend.append(pending.kind, &pending.key, &pending.value) {
            Ok(sequence) => {
                appended += 1;
                tracing::trace!(sequence, kind = %pending.kind, key = %pending.key, "event appended");
            }
            Err(e) => {
                // Refuse new events before anyone can observe the failure.
                rx.close();
                tracing::error!(error = %e, key = %pending.key, "event log append failed, writer stopping");
                errors.send_replace(Some(Arc::new(Error::DurabilityWriteFailed(Box::new(e)))));
                return appended;
            }
        }
    }

    appended
}
