//! Durable key-value storage built on a replayable event log.
//!
//! This crate is the durability core of kvlog: an in-memory [`Store`] that
//! answers queries, and an append-only event log that records every mutation
//! so the store can be rebuilt after a restart.
//!
//! # Overview
//!
//! The storage layer has four parts:
//!
//! 1. **Store**: the in-memory map behind a reader/writer lock. It is the
//!    ground truth for reads and holds no disk state of its own.
//!
//! 2. **Backends**: durable media implementing [`EventLogBackend`]. Two ship
//!    with the crate: [`FileBackend`] (one tab-separated line per event) and
//!    [`TableBackend`] (a SQLite `transactions` table).
//!
//! 3. **Writer**: the [`EventLogWriter`] queues mutations (up to
//!    [`QUEUE_CAPACITY`] pending) and appends them on a single background
//!    worker. The first append failure stops it for good.
//!
//! 4. **Replay**: [`replay`] streams the persisted log into the store at
//!    startup and then switches the writer to live mode.
//!
//! # Durability
//!
//! The store is mutated before the event reaches the backend, so durability is
//! at-most-once: the last few writes can be lost on a crash. Closing the writer
//! drains the queue, so a clean shutdown loses nothing.
//!
//! # Example
//!
//! ```no_run
//! use storage::{EventLogWriter, LogConfig, Store, replay};
//!
//! # async fn example() -> storage::Result<()> {
//! let store = Store::new();
//! let mut writer = EventLogWriter::new();
//!
//! // Rebuild the store and go live
//! let report = replay(&LogConfig::file("transaction.log"), &store, &mut writer).await?;
//! println!("replayed {} events", report.events);
//!
//! // Mutate, then record
//! store.put("x", "1");
//! writer.write_put("x", "1").await?;
//!
//! // Drain the queue before exiting
//! writer.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
mod error;
mod event;
mod replay;
mod store;
mod writer;

pub use backend::{EventLogBackend, FileBackend, LogConfig, MemoryBackend, TableBackend};
pub use error::{Error, Result};
pub use event::{Event, EventKind, Sequence, validate_key};
pub use replay::{ReplayReport, replay, replay_backend};
pub use store::Store;
pub use writer::{ErrorSignal, EventLogWriter, QUEUE_CAPACITY, WriterMode};
