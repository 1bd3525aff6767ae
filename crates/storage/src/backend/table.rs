//! SQLite table backend.

use super::EventLogBackend;
use crate::{Error, Event, EventKind, Result, Sequence};
use rusqlite::{Connection, params};

/// Event log stored as rows of a `transactions` table.
///
/// Sequence numbers come from the table's autoincrement primary key, so they
/// survive restarts without any bookkeeping on our side.
pub struct TableBackend {
    conn: Connection,
    poisoned: bool,
}

impl TableBackend {
    /// Open or create the table at the given database path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory table (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Fails fast on a database we cannot actually talk to.
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;

        let backend = Self {
            conn,
            poisoned: false,
        };
        backend.init_schema()?;
        Ok(backend)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn poison<T>(&mut self, err: impl Into<Error>) -> Result<T> {
        self.poisoned = true;
        Err(err.into())
    }
}

impl EventLogBackend for TableBackend {
    fn append(&mut self, kind: EventKind, key: &str, value: &str) -> Result<Sequence> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        let inserted = self.conn.execute(
            "INSERT INTO transactions (event_type, key, value) VALUES (?1, ?2, ?3)",
            params![kind.code(), key, value],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid() as Sequence),
            Err(e) => self.poison(e),
        }
    }

    fn read_all(&mut self, sink: &mut dyn FnMut(Event) -> bool) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        let result = read_rows(&self.conn, sink);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }
}

fn read_rows(conn: &Connection, sink: &mut dyn FnMut(Event) -> bool) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT sequence, event_type, key, value FROM transactions ORDER BY sequence")?;
    let mut rows = stmt.query([])?;

    while let Some(row) = rows.next()? {
        let sequence: i64 = row.get(0)?;
        let code: i64 = row.get(1)?;
        let kind = EventKind::from_code(code).ok_or_else(|| Error::Corrupt {
            record: sequence as u64,
            reason: format!("unknown event type {code}"),
        })?;

        let event = Event {
            sequence: sequence as Sequence,
            kind,
            key: row.get(2)?,
            value: row.get(3)?,
        };
        if !sink(event) {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(backend: &mut TableBackend) -> Vec<Event> {
        let mut events = Vec::new();
        backend
            .read_all(&mut |event| {
                events.push(event);
                true
            })
            .unwrap();
        events
    }

    #[test]
    fn append_assigns_increasing_sequences() {
        let mut backend = TableBackend::in_memory().unwrap();
        let a = backend.append(EventKind::Put, "x", "1").unwrap();
        let b = backend.append(EventKind::Delete, "y", "").unwrap();
        assert!(b > a);
    }

    #[test]
    fn read_all_in_sequence_order() {
        let mut backend = TableBackend::in_memory().unwrap();
        backend.append(EventKind::Put, "x", "1").unwrap();
        backend.append(EventKind::Put, "x", "2").unwrap();
        backend.append(EventKind::Delete, "y", "").unwrap();

        let events = collect(&mut backend);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].value, "1");
        assert_eq!(events[1].value, "2");
        assert_eq!(events[2].kind, EventKind::Delete);
        assert!(events.windows(2).all(|w| w[0].sequence < w[1].sequence));
    }

    #[test]
    fn sequences_resume_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.db");
        let path = path.to_str().unwrap();

        let first = {
            let mut backend = TableBackend::open(path).unwrap();
            backend.append(EventKind::Put, "a", "1").unwrap()
        };
        let mut backend = TableBackend::open(path).unwrap();
        let second = backend.append(EventKind::Put, "b", "2").unwrap();
        assert!(second > first);
        assert_eq!(collect(&mut backend).len(), 2);
    }

    #[test]
    fn unknown_event_type_is_corrupt() {
        let mut backend = TableBackend::in_memory().unwrap();
        backend
            .conn
            .execute(
                "INSERT INTO transactions (event_type, key, value) VALUES (9, 'k', '')",
                [],
            )
            .unwrap();

        let err = backend.read_all(&mut |_| true).unwrap_err();
        assert!(matches!(err, Error::Corrupt { record: 1, .. }));
        assert!(matches!(
            backend.append(EventKind::Put, "k", "v"),
            Err(Error::Poisoned)
        ));
    }

    #[test]
    fn failed_append_poisons_backend() {
        let mut backend = TableBackend::in_memory().unwrap();
        backend.conn.execute_batch("DROP TABLE transactions").unwrap();

        assert!(matches!(
            backend.append(EventKind::Put, "k", "v"),
            Err(Error::Database(_))
        ));
        assert!(matches!(
            backend.append(EventKind::Put, "k", "v"),
            Err(Error::Poisoned)
        ));
    }
}
