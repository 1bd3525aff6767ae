//! Startup replay.
//!
//! Replay runs once, before the service takes traffic:
//!
//! 1. open the configured backend (failure: [`Error::BackendUnavailable`]);
//! 2. stream every persisted event from a blocking reader into one merged
//!    channel of `Result<Event>`;
//! 3. apply each event to the [`Store`], stopping on the first error
//!    ([`Error::ReplayFailed`]);
//! 4. once the stream ends cleanly, hand the backend to the writer and switch
//!    it to live mode.

use crate::backend::{EventLogBackend, LogConfig};
use crate::writer::{EventLogWriter, WriterMode};
use crate::{Error, Event, Result, Sequence, Store};
use tokio::sync::mpsc;

/// Events buffered between the reader and the store.
const REPLAY_BUFFER: usize = 256;

/// Outcome of a successful replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Number of events applied.
    pub events: u64,
    /// Sequence of the last applied event, if the log was not empty.
    pub last_sequence: Option<Sequence>,
}

/// Open the backend described by `config`, replay it into `store` and bring
/// `writer` live.
pub async fn replay(
    config: &LogConfig,
    store: &Store,
    writer: &mut EventLogWriter,
) -> Result<ReplayReport> {
    let backend = config.open()?;
    tracing::info!(target = %config.target(), "replaying event log");
    replay_backend(backend, store, writer).await
}

/// Replay an already opened backend into `store` and bring `writer` live.
///
/// On error the writer stays in [`WriterMode::Replaying`] and the backend is
/// dropped; the store may hold a partial state and must not be served.
pub async fn replay_backend(
    mut backend: Box<dyn EventLogBackend>,
    store: &Store,
    writer: &mut EventLogWriter,
) -> Result<ReplayReport> {
    if writer.mode() != WriterMode::Replaying {
        return Err(Error::AlreadyLive);
    }

    let (tx, mut rx) = mpsc::channel::<Result<Event>>(REPLAY_BUFFER);
    let reader = tokio::task::spawn_blocking(move || {
        // A closed channel means the consumer gave up; stop reading.
        let result = backend.read_all(&mut |event| tx.blocking_send(Ok(event)).is_ok());
        if let Err(e) = result {
            let _ = tx.blocking_send(Err(e));
        }
        backend
    });

    let mut report = ReplayReport::default();
    while let Some(item) = rx.recv().await {
        match item {
            Ok(event) => {
                store.apply(&event);
                report.events += 1;
                report.last_sequence = Some(event.sequence);
            }
            Err(e) => {
                tracing::error!(error = %e, applied = report.events, "event log replay failed");
                return Err(Error::ReplayFailed(Box::new(e)));
            }
        }
    }

    let backend = reader
        .await
        .map_err(|e| Error::ReplayFailed(Box::new(std::io::Error::other(e).into())))?;
    writer.go_live(backend)?;

    tracing::info!(
        events = report.events,
        last_sequence = ?report.last_sequence,
        "event log replay complete"
    );
    Ok(report)
}
