//! In-memory backend for tests.

use super::EventLogBackend;
use crate::{Error, Event, EventKind, Result, Sequence};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory event log. Clones share the same events, so a test can keep a
/// handle while the writer owns the backend.
///
/// Failures can be injected to exercise the fail-stop paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Event>,
    fail_append_at: Option<usize>,
    fail_read_at: Option<usize>,
    attempts: usize,
    poisoned: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log with previously persisted events.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let backend = Self::new();
        backend.lock().events.extend(events);
        backend
    }

    /// Make the `n`th append (1-based) fail.
    pub fn fail_append_at(self, n: usize) -> Self {
        self.lock().fail_append_at = Some(n);
        self
    }

    /// Make reads fail after delivering `n` events.
    pub fn fail_read_at(self, n: usize) -> Self {
        self.lock().fail_read_at = Some(n);
        self
    }

    /// Every event persisted so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_failure(&self) -> Result<()> {
        self.lock().poisoned = true;
        Err(io::Error::other("injected read failure").into())
    }
}

impl EventLogBackend for MemoryBackend {
    fn append(&mut self, kind: EventKind, key: &str, value: &str) -> Result<Sequence> {
        let mut inner = self.lock();
        if inner.poisoned {
            return Err(Error::Poisoned);
        }

        inner.attempts += 1;
        if inner.fail_append_at == Some(inner.attempts) {
            inner.poisoned = true;
            return Err(io::Error::other("injected append failure").into());
        }

        let sequence = inner.events.last().map_or(0, |e| e.sequence) + 1;
        inner.events.push(Event {
            sequence,
            kind,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(sequence)
    }

    fn read_all(&mut self, sink: &mut dyn FnMut(Event) -> bool) -> Result<()> {
        let (events, fail_at) = {
            let inner = self.lock();
            (inner.events.clone(), inner.fail_read_at)
        };

        let total = events.len();
        for (delivered, event) in events.into_iter().enumerate() {
            if fail_at == Some(delivered) {
                return self.read_failure();
            }
            if !sink(event) {
                return Ok(());
            }
        }
        if fail_at.is_some_and(|n| n >= total) {
            return self.read_failure();
        }
        Ok(())
    }
}

