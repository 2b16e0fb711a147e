use std::fmt;
use std::io;
use std::str::FromStr;

/// Log is an append only log of line-encoded entries. Entries carry their own sequence number,
/// which must strictly increase with every append. This makes the log searchable by sequence
/// without any extra index.
///
/// Once `append()` returns Ok, the entry is visible to every later read, including reads from a
/// new instance opened over the same storage.
pub trait Log<E: Entry> {
    fn append(&mut self, entry: E) -> Result<(), LogError>;

    /// Read up to `max_entries` entries whose sequence is strictly greater than `after`, in
    /// ascending order. Callers page through the log by passing the last sequence they received.
    fn read_batch(&self, after: u64, max_entries: usize) -> Result<Vec<E>, LogError>;

    /// Sequence of the latest appended entry, or 0 if the log is empty.
    fn latest_sequence(&self) -> u64;

    /// All entries with a sequence strictly greater than `after`, in ascending order.
    fn scan_newer_than(&self, after: u64) -> Result<Vec<E>, LogError> {
        self.read_batch(after, usize::MAX)
    }

    fn replay_all(&self) -> Result<Vec<E>, LogError> {
        self.scan_newer_than(0)
    }
}

/// An Entry is written as a single line of text (without the trailing newline) and must parse
/// back from that line.
pub trait Entry: Clone + fmt::Display + FromStr<Err = MalformedEntry> {
    fn sequence(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed entry '{line}': {reason}")]
pub struct MalformedEntry {
    pub line: String,
    pub reason: &'static str,
}

impl MalformedEntry {
    pub fn new(line: &str, reason: &'static str) -> Self {
        MalformedEntry {
            line: line.to_string(),
            reason,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log IO failure: {0}")]
    Io(#[from] io::Error),

    #[error("log line {line_number} is corrupt: {source}")]
    Corrupt {
        line_number: usize,
        #[source]
        source: MalformedEntry,
    },

    #[error("entry sequence {attempted} does not follow latest sequence {latest}")]
    OutOfOrder { latest: u64, attempted: u64 },

    #[error("entry '{0}' encodes to more than one line")]
    MultiLine(String),
}

// Shared by implementations: check the append invariants before touching storage.
pub(super) fn validate_append<E: Entry>(latest: u64, entry: &E) -> Result<String, LogError> {
    let attempted = entry.sequence();
    if attempted <= latest {
        return Err(LogError::OutOfOrder { latest, attempted });
    }

    let line = entry.to_string();
    if line.contains('\n') {
        return Err(LogError::MultiLine(line));
    }

    Ok(line)
}
