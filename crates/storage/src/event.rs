//! Event types for the event log.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Position of an event in the log. Strictly increasing within one backend.
pub type Sequence = u64;

/// The kind of mutation an event records.
///
/// The numeric codes are part of the on-disk and on-table format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A key was removed.
    Delete,
    /// A key was set to a value.
    Put,
}

impl EventKind {
    /// The numeric code written to the log.
    pub fn code(self) -> u8 {
        match self {
            EventKind::Delete => 1,
            EventKind::Put => 2,
        }
    }

    /// Decode a numeric code read back from the log.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(EventKind::Delete),
            2 => Some(EventKind::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Delete => f.pad("delete"),
            EventKind::Put => f.pad("put"),
        }
    }
}

/// One persisted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: Sequence,
    pub kind: EventKind,
    pub key: String,
    /// Empty for deletes.
    pub value: String,
}

impl Event {
    pub fn put(sequence: Sequence, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(sequence: Sequence, key: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }
}

/// Reject keys that cannot be recorded.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_match_log_format() {
        assert_eq!(EventKind::Delete.code(), 1);
        assert_eq!(EventKind::Put.code(), 2);
        assert_eq!(EventKind::from_code(1), Some(EventKind::Delete));
        assert_eq!(EventKind::from_code(2), Some(EventKind::Put));
        assert_eq!(EventKind::from_code(0), None);
        assert_eq!(EventKind::from_code(3), None);
    }

    #[test]
    fn delete_has_empty_value() {
        let event = Event::delete(7, "k");
        assert_eq!(event.kind, EventKind::Delete);
        assert!(event.value.is_empty());
    }

    #[test]
    fn serializes_kind_lowercase() {
        let json = serde_json::to_string(&Event::put(1, "a", "b")).unwrap();
        assert_eq!(json, r#"{"sequence":1,"kind":"put","key":"a","value":"b"}"#);
    }

    #[test]
    fn empty_key_rejected() {
        assert!(matches!(validate_key(""), Err(Error::InvalidKey(_))));
        assert!(validate_key("k").is_ok());
    }
}
