use thiserror::Error;

/// Errors raised by the store, the event log backends and the replay path.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The key is not present in the store.
    #[error("no such key: {0}")]
    NotFound(String),

    /// The key cannot be stored (empty keys are rejected).
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The durable medium could not be opened or initialised.
    #[error("event log backend unavailable at {target}: {source}")]
    BackendUnavailable {
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// Re-reading the persisted log failed; the store state is unknown.
    #[error("replay failed: {0}")]
    ReplayFailed(#[source] Box<Error>),

    /// A background append failed after startup.
    #[error("durable write failed: {0}")]
    DurabilityWriteFailed(#[source] Box<Error>),

    /// A persisted record could not be decoded.
    #[error("corrupt event log at record {record}: {reason}")]
    Corrupt { record: u64, reason: String },

    /// The backend already failed once and refuses further writes.
    #[error("event log backend stopped after an earlier failure")]
    Poisoned,

    /// The writer has not been switched to live mode yet.
    #[error("event log writer is not live")]
    NotLive,

    /// The writer was already handed a backend.
    #[error("event log writer is already live")]
    AlreadyLive,

    /// The writer's background worker is gone.
    #[error("event log writer has stopped")]
    WriterStopped,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for a store lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
