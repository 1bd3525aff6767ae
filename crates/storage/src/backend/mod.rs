//! Event log backend abstraction.
//!
//! A backend is a durable append target. The writer and the replay path only
//! depend on [`EventLogBackend`], so a new medium plugs in without touching
//! either of them.

mod file;
mod memory;
mod table;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use table::TableBackend;

use crate::{Error, Event, EventKind, Result, Sequence};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Trait for durable event log media.
///
/// Implementations are driven by a single caller at a time (the writer's
/// worker, or the replay task before it). Any I/O failure in `append` or
/// `read_all` is fatal: the backend reports it once and answers every later
/// `append` with [`Error::Poisoned`].
pub trait EventLogBackend: Send {
    /// Durably record one event and return the sequence it was assigned.
    fn append(&mut self, kind: EventKind, key: &str, value: &str) -> Result<Sequence>;

    /// Push every persisted event to `sink` in ascending sequence order.
    ///
    /// Events are streamed as they are read; returning `false` from `sink`
    /// stops the read early. `Ok(())` means the log was consumed to the end.
    fn read_all(&mut self, sink: &mut dyn FnMut(Event) -> bool) -> Result<()>;
}

/// Which backend to open and where.
///
/// The target is opaque to the core: a file path for the file backend, a
/// database path (or `:memory:`) for the table backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum LogConfig {
    File {
        path: PathBuf,
        /// Fsync after every append.
        #[serde(default)]
        sync: bool,
    },
    Table {
        path: String,
    },
}

impl LogConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        LogConfig::File {
            path: path.into(),
            sync: false,
        }
    }

    pub fn table(path: impl Into<String>) -> Self {
        LogConfig::Table { path: path.into() }
    }

    /// Human-readable location of the log.
    pub fn target(&self) -> String {
        match self {
            LogConfig::File { path, .. } => path.display().to_string(),
            LogConfig::Table { path } => path.clone(),
        }
    }

    /// Open the configured backend, creating the file or schema if absent.
    pub fn open(&self) -> Result<Box<dyn EventLogBackend>> {
        let opened: Result<Box<dyn EventLogBackend>> = match self {
            LogConfig::File { path, sync } => FileBackend::open(path)
                .map(|backend| Box::new(backend.with_sync(*sync)) as Box<dyn EventLogBackend>),
            LogConfig::Table { path } => {
                TableBackend::open(path).map(|backend| Box::new(backend) as Box<dyn EventLogBackend>)
            }
        };

        opened.map_err(|e| Error::BackendUnavailable {
            target: self.target(),
            source: Box::new(e),
        })
    }
}
