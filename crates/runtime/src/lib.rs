//! kvlog runtime: the running key-value service.
//!
//! A [`Service`] owns one in-memory store and one event log writer for the
//! lifetime of a running instance. Starting it opens the configured log,
//! replays it into the store and only then switches the writer to live mode;
//! a service that fails to replay never starts.
//!
//! # Example
//!
//! ```no_run
//! use runtime::Service;
//! use storage::LogConfig;
//!
//! # async fn example() -> runtime::Result<()> {
//! let service = Service::start(&LogConfig::file("transaction.log")).await?;
//!
//! service.put("x", "1").await?;
//! assert_eq!(service.get("x")?, "1");
//! service.delete("x").await?;
//!
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod service;

pub use error::{Error, Result};
pub use service::{Health, Service};
