use crate::commitlog::MalformedEntry;
use crate::replica::{LamportCounter, Lts, ServerId};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A chat message as shown to clients.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub lts: Lts,
    pub username: String,
    pub text: String,
    pub like_count: u32,
}

/// ArchivedMessage is a message that has been evicted from a chatroom's in-memory ring into its
/// history file, together with everyone who liked it while it was resident.
///
/// Line format:
///
/// ```text
/// origin~counter~username~text~liker1,liker2,...
/// ```
///
/// `text` may contain `~`. It is recovered as everything between the username and the last `~`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ArchivedMessage {
    pub lts: Lts,
    pub username: String,
    pub text: String,
    pub likers: BTreeSet<String>,
}

impl ArchivedMessage {
    pub fn to_message(&self) -> Message {
        Message {
            lts: self.lts,
            username: self.username.clone(),
            text: self.text.clone(),
            like_count: self.likers.len() as u32,
        }
    }
}

impl fmt::Display for ArchivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let likers: Vec<&str> = self.likers.iter().map(|l| l.as_str()).collect();
        write!(
            f,
            "{}~{}~{}~{}~{}",
            self.lts.origin,
            self.lts.counter,
            self.username,
            self.text,
            likers.join(",")
        )
    }
}

impl FromStr for ArchivedMessage {
    type Err = MalformedEntry;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut head = line.splitn(4, '~');
        let origin = head
            .next()
            .and_then(|o| o.parse::<u32>().ok())
            .and_then(|o| ServerId::new(o).ok())
            .ok_or_else(|| MalformedEntry::new(line, "bad origin server"))?;
        let counter = head
            .next()
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| MalformedEntry::new(line, "bad lamport counter"))?;
        let username = head
            .next()
            .ok_or_else(|| MalformedEntry::new(line, "missing username"))?;
        let rest = head
            .next()
            .ok_or_else(|| MalformedEntry::new(line, "missing text"))?;
        let (text, likers) = rest
            .rsplit_once('~')
            .ok_or_else(|| MalformedEntry::new(line, "missing likers"))?;

        Ok(ArchivedMessage {
            lts: Lts::new(origin, LamportCounter::new(counter)),
            username: username.to_string(),
            text: text.to_string(),
            likers: likers
                .split(',')
                .filter(|l| !l.is_empty())
                .map(|l| l.to_string())
                .collect(),
        })
    }
}
