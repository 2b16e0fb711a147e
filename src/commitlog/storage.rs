use crate::commitlog::log::validate_append;
use crate::commitlog::{Entry, Log, LogError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// FileLog is a durable log stored as one text file with one entry per line.
///
/// ```text
/// <entry line>\n
/// <entry line>\n
/// ...
/// ```
///
/// Every append is a single `write` followed by `fsync`, so after a crash the file holds a prefix
/// of complete lines plus at most one torn line, which `open()` cuts off.
///
/// The decoded entries are also kept in memory. The file is only ever read at `open()`.
pub struct FileLog<E: Entry> {
    file: File,
    entries: Vec<E>,
}

impl<E: Entry> FileLog<E> {
    /// Open (creating if needed) the log at `path`. `recreate` discards any existing content.
    pub fn open<P: AsRef<Path>>(path: P, recreate: bool) -> Result<Self, LogError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        if recreate {
            file.set_len(0)?;
        }

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut entries: Vec<E> = Vec::new();
        let mut valid_len = 0;
        for (i, line) in contents.split_inclusive('\n').enumerate() {
            let body = match line.strip_suffix('\n') {
                Some(body) => body,
                // Torn tail from a crash mid-append. It was never acknowledged.
                None => break,
            };

            let entry = body.parse::<E>().map_err(|source| LogError::Corrupt {
                line_number: i + 1,
                source,
            })?;
            let latest = entries.last().map(|e| e.sequence()).unwrap_or(0);
            if entry.sequence() <= latest {
                return Err(LogError::OutOfOrder {
                    latest,
                    attempted: entry.sequence(),
                });
            }

            entries.push(entry);
            valid_len += line.len();
        }

        if valid_len < contents.len() {
            file.set_len(valid_len as u64)?;
        }

        Ok(FileLog { file, entries })
    }
}

impl<E: Entry> Log<E> for FileLog<E> {
    fn append(&mut self, entry: E) -> Result<(), LogError> {
        let mut line = validate_append(self.latest_sequence(), &entry)?;
        line.push('\n');

        self.file.write_all(line.as_bytes())?;
        self.file.sync_data()?;

        // Only update in-memory state after the write is durable.
        self.entries.push(entry);
        Ok(())
    }

    fn read_batch(&self, after: u64, max_entries: usize) -> Result<Vec<E>, LogError> {
        let start = self.entries.partition_point(|e| e.sequence() <= after);

        Ok(self.entries[start..].iter().take(max_entries).cloned().collect())
    }

    fn latest_sequence(&self) -> u64 {
        self.entries.last().map(|e| e.sequence()).unwrap_or(0)
    }
}
