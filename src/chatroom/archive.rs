use crate::chatroom::message::ArchivedMessage;
use crate::commitlog::MalformedEntry;
use crate::replica::ServerId;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

/// HistoryArchive is where messages go when they fall out of a chatroom's in-memory ring.
pub trait HistoryArchive {
    fn archive(&mut self, chatroom: &str, message: &ArchivedMessage) -> Result<(), ArchiveError>;

    /// Every archived message of `chatroom`, oldest first.
    fn history(&self, chatroom: &str) -> Result<Vec<ArchivedMessage>, ArchiveError>;

    /// Forget all archived history. Used before rebuilding chatrooms from the update log.
    fn reset_all(&mut self) -> Result<(), ArchiveError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("chatroom history IO failure: {0}")]
    Io(#[from] io::Error),
    #[error("chatroom history for '{chatroom}' is corrupt: {source}")]
    Corrupt {
        chatroom: String,
        #[source]
        source: MalformedEntry,
    },
}

#[derive(Default)]
pub struct InMemoryArchive {
    rooms: HashMap<String, Vec<ArchivedMessage>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryArchive for InMemoryArchive {
    fn archive(&mut self, chatroom: &str, message: &ArchivedMessage) -> Result<(), ArchiveError> {
        self.rooms
            .entry(chatroom.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn history(&self, chatroom: &str) -> Result<Vec<ArchivedMessage>, ArchiveError> {
        Ok(self.rooms.get(chatroom).cloned().unwrap_or_default())
    }

    fn reset_all(&mut self) -> Result<(), ArchiveError> {
        self.rooms.clear();
        Ok(())
    }
}

/// FileArchive keeps one history file per chatroom, named `{me}_{chatroom}.chatroom`, inside
/// `directory`. The chatroom part is percent-encoded, so any name maps to a single file there.
pub struct FileArchive {
    directory: PathBuf,
    me: ServerId,
}

const FILE_SUFFIX: &str = ".chatroom";

impl FileArchive {
    pub fn new(directory: PathBuf, me: ServerId) -> Self {
        FileArchive { directory, me }
    }

    fn file_prefix(&self) -> String {
        format!("{}_", self.me)
    }

    fn path(&self, chatroom: &str) -> PathBuf {
        self.directory.join(format!(
            "{}{}{}",
            self.file_prefix(),
            urlencoding::encode(chatroom),
            FILE_SUFFIX
        ))
    }
}

impl HistoryArchive for FileArchive {
    fn archive(&mut self, chatroom: &str, message: &ArchivedMessage) -> Result<(), ArchiveError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(chatroom))?;
        file.write_all(format!("{}\n", message).as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn history(&self, chatroom: &str) -> Result<Vec<ArchivedMessage>, ArchiveError> {
        let contents = match fs::read_to_string(self.path(chatroom)) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .map(|line| {
                line.parse::<ArchivedMessage>()
                    .map_err(|source| ArchiveError::Corrupt {
                        chatroom: chatroom.to_string(),
                        source,
                    })
            })
            .collect()
    }

    fn reset_all(&mut self) -> Result<(), ArchiveError> {
        let prefix = self.file_prefix();
        for dir_entry in fs::read_dir(&self.directory)? {
            let dir_entry = dir_entry?;
            let file_name = dir_entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&prefix) && file_name.ends_with(FILE_SUFFIX) {
                fs::remove_file(dir_entry.path())?;
            }
        }
        Ok(())
    }
}
