use thiserror::Error;

/// Runtime errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Durable writes stopped; the store still answers but is no longer
    /// persisted.
    #[error("service degraded: {0}")]
    Degraded(String),

    /// The service was shut down.
    #[error("service is shut down")]
    ShutDown,

    #[error(transparent)]
    Storage(#[from] storage::Error),
}

impl Error {
    /// Returns true for a store lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Storage(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
