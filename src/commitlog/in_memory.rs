use crate::commitlog::log::validate_append;
use crate::commitlog::{Entry, Log, LogError};
use std::marker::PhantomData;

// Volatile log for tests and throwaway servers. It survives nothing.
pub struct InMemoryLog<E: Entry> {
    // Entries are held as the lines FileLog would write, paired with their sequence.
    lines: Vec<(u64, String)>,
    _pd: PhantomData<E>,
}

impl<E: Entry> InMemoryLog<E> {
    pub fn new() -> Self {
        InMemoryLog {
            lines: vec![],
            _pd: PhantomData::default(),
        }
    }
}

impl<E: Entry> Default for InMemoryLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entry> Log<E> for InMemoryLog<E> {
    fn append(&mut self, entry: E) -> Result<(), LogError> {
        let line = validate_append(self.latest_sequence(), &entry)?;
        self.lines.push((entry.sequence(), line));

        Ok(())
    }

    fn read_batch(&self, after: u64, max_entries: usize) -> Result<Vec<E>, LogError> {
        let start = self.lines.partition_point(|(sequence, _)| *sequence <= after);

        self.lines[start..]
            .iter()
            .take(max_entries)
            .enumerate()
            .map(|(i, (_, line))| {
                line.parse::<E>().map_err(|source| LogError::Corrupt {
                    line_number: start + i + 1,
                    source,
                })
            })
            .collect()
    }

    fn latest_sequence(&self) -> u64 {
        self.lines.last().map(|(sequence, _)| *sequence).unwrap_or(0)
    }
}
