//! Append-only file backend.
//!
//! Every event is one line:
//!
//! ```text
//! <sequence>\t<event_type>\t<key>\t<value>\n
//! ```
//!
//! Tabs, newlines, carriage returns and backslashes inside keys and values are
//! backslash-escaped so a record never spans more than one line.

use super::EventLogBackend;
use crate::{Error, Event, EventKind, Result, Sequence};
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Event log stored as a line-oriented append-only file.
pub struct FileBackend {
    path: PathBuf,
    file: File,
    last_sequence: Sequence,
    sync: bool,
    poisoned: bool,
}

impl FileBackend {
    /// Open the log file, creating it (and its parent directory) if absent.
    ///
    /// The sequence counter is seeded from the highest sequence already in the
    /// file, so appending without a prior replay never reuses a sequence.
    /// Records are not validated here; [`EventLogBackend::read_all`] reports
    /// corruption.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let last_sequence = scan_last_sequence(&file)?;

        Ok(Self {
            path,
            file,
            last_sequence,
            sync: false,
            poisoned: false,
        })
    }

    /// Fsync after every append instead of only handing data to the OS.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest sequence written or read so far.
    pub fn last_sequence(&self) -> Sequence {
        self.last_sequence
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn read_lines(&mut self, sink: &mut dyn FnMut(Event) -> bool) -> Result<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = String::new();
        let mut record = 0u64;
        let mut previous: Option<Sequence> = None;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            record += 1;

            let Some(body) = line.strip_suffix('\n') else {
                return Err(Error::Corrupt {
                    record,
                    reason: "truncated record".to_string(),
                });
            };
            let event = parse_record(body).map_err(|reason| Error::Corrupt { record, reason })?;

            if previous.is_some_and(|prev| event.sequence <= prev) {
                return Err(Error::Corrupt {
                    record,
                    reason: format!("sequence {} out of order", event.sequence),
                });
            }
            previous = Some(event.sequence);
            self.last_sequence = self.last_sequence.max(event.sequence);

            if !sink(event) {
                return Ok(());
            }
        }
    }
}

impl EventLogBackend for FileBackend {
    fn append(&mut self, kind: EventKind, key: &str, value: &str) -> Result<Sequence> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        let sequence = self.last_sequence + 1;
        let line = format!(
            "{sequence}\t{}\t{}\t{}\n",
            kind.code(),
            escape(key),
            escape(value)
        );
        if let Err(e) = self.write_line(&line) {
            self.poisoned = true;
            return Err(e.into());
        }

        self.last_sequence = sequence;
        Ok(sequence)
    }

    fn read_all(&mut self, sink: &mut dyn FnMut(Event) -> bool) -> Result<()> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }

        let result = self.read_lines(sink);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }
}

/// Highest leading sequence field among the complete lines of `file`.
fn scan_last_sequence(file: &File) -> std::io::Result<Sequence> {
    let mut last = 0;
    for line in BufReader::new(file).split(b'\n') {
        let line = line?;
        let field = line.split(|&b| b == b'\t').next().unwrap_or_default();
        if let Some(sequence) = std::str::from_utf8(field)
            .ok()
            .and_then(|s| s.parse::<Sequence>().ok())
        {
            last = last.max(sequence);
        }
    }
    Ok(last)
}

fn parse_record(body: &str) -> std::result::Result<Event, String> {
    let mut fields = body.splitn(4, '\t');
    let (Some(sequence), Some(code), Some(key), Some(value)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err("expected 4 tab-separated fields".to_string());
    };

    let sequence: Sequence = sequence
        .parse()
        .map_err(|_| format!("invalid sequence {sequence:?}"))?;
    let kind = code
        .parse()
        .ok()
        .and_then(EventKind::from_code)
        .ok_or_else(|| format!("unknown event type {code:?}"))?;

    Ok(Event {
        sequence,
        kind,
        key: unescape(key)?,
        value: unescape(value)?,
    })
}

fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains(['\\', '\t', '\n', '\r']) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(field: &str) -> std::result::Result<String, String> {
    if !field.contains('\\') {
        return Ok(field.to_string());
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => return Err(format!("invalid escape {other:?}")),
        }
    }
    Ok(out)
}
