//! Append-only conversation history.
//!
//! Each process writes one file, named after its start time, under the
//! history directory.  Records look like:
//!
//! ```text
//! <USER>
//! Show me local files.
//! </USER>
//!
//! ```
//!
//! The file is opened, appended, and closed on every write so it can be
//! inspected while a session is running.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::{Error, Result};
use crate::observability::{HISTORY_WRITE_ERRORS, HISTORY_WRITES};

/// The role a history record is written under.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HistoryRole {
    /// What the user typed.
    User,
    /// The model's reply.
    Assistant,
    /// Command output, or the skip notice.
    System,
    /// A per-turn failure.
    Error,
}

impl HistoryRole {
    /// The tag name used in the log file.
    pub fn tag(self) -> &'static str {
        match self {
            HistoryRole::User => "USER",
            HistoryRole::Assistant => "ChatSH",
            HistoryRole::System => "SYSTEM",
            HistoryRole::Error => "ERROR",
        }
    }
}

impl fmt::Display for HistoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One record as it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Role the record is written under.
    pub role: HistoryRole,
    /// Record body.
    pub message: String,
    /// When the record was written.
    pub written_at: OffsetDateTime,
}

impl HistoryRecord {
    /// Creates a record stamped with the current time.
    pub fn new(role: HistoryRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            written_at: OffsetDateTime::now_utc(),
        }
    }

    /// The record in its on-disk form.
    pub fn render(&self) -> String {
        let tag = self.role.tag();
        format!("<{tag}>\n{}\n</{tag}>\n\n", self.message)
    }
}

/// Destination for conversation records.
pub trait Transcript: Send {
    /// Appends one record.
    fn append(&mut self, role: HistoryRole, message: &str) -> Result<()>;
}

/// File-backed [`Transcript`].
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Creates the history directory and picks this process's file name.
    ///
    /// No file is created until the first record is appended.
    pub fn create(dir: impl AsRef<Path>, started_at: OffsetDateTime) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| {
            Error::io(
                format!("failed to create history directory {}", dir.display()),
                err,
            )
        })?;
        Ok(Self {
            path: dir.join(conversation_file_name(started_at)?),
        })
    }

    /// Opens a log at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this log appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transcript for HistoryLog {
    fn append(&mut self, role: HistoryRole, message: &str) -> Result<()> {
        let record = HistoryRecord::new(role, message);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(record.render().as_bytes()));
        match result {
            Ok(()) => {
                HISTORY_WRITES.click();
                Ok(())
            }
            Err(err) => {
                HISTORY_WRITE_ERRORS.click();
                Err(Error::io(
                    format!("failed to append to {}", self.path.display()),
                    err,
                ))
            }
        }
    }
}

/// In-memory [`Transcript`], useful for tests and dry runs.
///
/// Clones share the same records, so a caller can keep a handle while the
/// conversation loop owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscript {
    records: Arc<Mutex<Vec<HistoryRecord>>>,
}

impl MemoryTranscript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record appended so far.
    pub fn records(&self) -> Vec<HistoryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Transcript for MemoryTranscript {
    fn append(&mut self, role: HistoryRole, message: &str) -> Result<()> {
        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push(HistoryRecord::new(role, message));
        Ok(())
    }
}

/// `conversation_<ISO-8601>.txt` with colons replaced by hyphens.
pub fn conversation_file_name(started_at: OffsetDateTime) -> Result<String> {
    let stamp = started_at
        .format(format_description!(
            "[year]-[month]-[day]T[hour]-[minute]-[second].[subsecond digits:6]"
        ))
        .map_err(|err| Error::encoding(format!("invalid timestamp: {err}"), Some(Box::new(err))))?;
    Ok(format!("conversation_{stamp}.txt"))
}
