//! Append only, self linking event log.
//!
//! The log is a JSON lines file. Every record carries the byte offset at
//! which the preceding record starts in its `previous` field (`-1` for the
//! first record), so the file can be walked backwards without an index.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use retro_core::{ErrorInfo, RetroError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::Event;

/// One log line: the backward link and the flattened payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord<T> {
    /// Byte offset of the preceding record, `-1` for the first one.
    pub previous: i64,
    /// Record content.
    #[serde(flatten)]
    pub payload: T,
}

/// Writer side of the event log.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    file: File,
    end: u64,
    last_offset: i64,
    records: u64,
}

impl EventLog {
    /// Creates the log, truncating any existing file.
    pub fn create(path: &Path) -> Result<Self, RetroError> {
        ensure_parent(path)?;
        let file = File::create(path).map_err(|err| RetroError::io("log-create", &err, path))?;
        debug!(path = %path.display(), "created event log");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            end: 0,
            last_offset: -1,
            records: 0,
        })
    }

    /// Opens an existing log for appending, or creates it. The existing
    /// records are scanned to recover the backward chain.
    pub fn open_append(path: &Path) -> Result<Self, RetroError> {
        if !path.exists() {
            return Self::create(path);
        }
        let mut reader = EventIterator::<serde_json::Value>::open(path)?;
        let mut last_offset = -1;
        let mut count = 0_u64;
        loop {
            let start = reader.position();
            let Some(record) = reader.next_record()? else {
                break;
            };
            if record.previous != last_offset {
                return Err(RetroError::Log(
                    ErrorInfo::new("broken-chain", "record does not link to its predecessor")
                        .with_context("path", path.display().to_string())
                        .with_context("offset", start.to_string())
                        .with_context("previous", record.previous.to_string()),
                ));
            }
            last_offset = start as i64;
            count += 1;
        }
        let end = reader.position();
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|err| RetroError::io("log-open", &err, path))?;
        debug!(path = %path.display(), records = count, "resumed event log");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            end,
            last_offset,
            records: count,
        })
    }

    /// Appends one record and returns the offset at which it starts.
    pub fn append<T: Serialize>(&mut self, payload: &T) -> Result<u64, RetroError> {
        let record = LogRecord {
            previous: self.last_offset,
            payload,
        };
        let mut line = serde_json::to_string(&record).map_err(|err| {
            RetroError::Serde(
                ErrorInfo::new("log-serialize", err.to_string())
                    .with_context("path", self.path.display().to_string()),
            )
        })?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|err| RetroError::io("log-write", &err, &self.path))?;
        let offset = self.end;
        self.end += line.len() as u64;
        self.last_offset = offset as i64;
        self.records += 1;
        Ok(offset)
    }

    /// Offset of the latest record, `-1` for an empty log.
    pub fn last_offset(&self) -> i64 {
        self.last_offset
    }

    /// Number of records in the log, including those found on resume.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Bidirectional reader over an event log.
///
/// A clean end of file yields `Ok(None)`. A line that fails to parse,
/// including a final line missing its newline, is reported as a `Log` error
/// with code `corrupt-record` and the byte offset of the line.
#[derive(Debug)]
pub struct EventIterator<T = Event> {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    previous: i64,
    line: String,
    failed: bool,
    payload: PhantomData<T>,
}

impl<T: DeserializeOwned> EventIterator<T> {
    /// Opens a log for reading, positioned at its first record.
    pub fn open(path: &Path) -> Result<Self, RetroError> {
        let file = File::open(path).map_err(|err| RetroError::io("log-open", &err, path))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            position: 0,
            previous: -1,
            line: String::new(),
            failed: false,
            payload: PhantomData,
        })
    }

    /// Byte offset of the next record to be read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads the record following the current one.
    pub fn next_record(&mut self) -> Result<Option<LogRecord<T>>, RetroError> {
        let start = self.position;
        self.line.clear();
        let read = self
            .reader
            .read_line(&mut self.line)
            .map_err(|err| RetroError::io("log-read", &err, &self.path))?;
        if read == 0 {
            return Ok(None);
        }
        if !self.line.ends_with('\n') {
            return Err(self.corrupt(start, "truncated record"));
        }
        let record: LogRecord<T> = serde_json::from_str(&self.line)
            .map_err(|err| self.corrupt(start, err.to_string()))?;
        if record.previous >= start as i64 {
            return Err(self.corrupt(start, "record links forward"));
        }
        self.position += read as u64;
        self.previous = record.previous;
        Ok(Some(record))
    }

    /// Steps back one record and returns the record preceding the current
    /// one. Once the first record is current, rewinds and returns `None`.
    pub fn previous(&mut self) -> Result<Option<LogRecord<T>>, RetroError> {
        if self.previous < 0 {
            self.rewind()?;
            return Ok(None);
        }
        let offset = self.previous as u64;
        self.seek(offset)?;
        match self.next_record()? {
            Some(record) => Ok(Some(record)),
            None => Err(self.corrupt(offset, "link past the end of the log")),
        }
    }

    /// Moves back to the first record.
    pub fn rewind(&mut self) -> Result<(), RetroError> {
        self.seek(0)?;
        self.previous = -1;
        Ok(())
    }

    fn seek(&mut self, offset: u64) -> Result<(), RetroError> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|err| RetroError::io("log-seek", &err, &self.path))?;
        self.position = offset;
        self.failed = false;
        Ok(())
    }

    fn corrupt(&self, offset: u64, message: impl Into<String>) -> RetroError {
        RetroError::Log(
            ErrorInfo::new("corrupt-record", message)
                .with_context("path", self.path.display().to_string())
                .with_context("offset", offset.to_string()),
        )
    }
}

impl<T: DeserializeOwned> Iterator for EventIterator<T> {
    type Item = Result<LogRecord<T>, RetroError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.next_record().transpose();
        self.failed = matches!(item, Some(Err(_)));
        item
    }
}

fn ensure_parent(path: &Path) -> Result<(), RetroError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| RetroError::io("log-mkdir", &err, parent))
        }
        _ => Ok(()),
    }
}
