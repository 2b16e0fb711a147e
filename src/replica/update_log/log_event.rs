use crate::commitlog::{Entry, MalformedEntry};
use crate::replica::ids::{LamportCounter, Lts, ServerId};
use std::fmt;
use std::str::FromStr;

const APPEND_CHAR: char = 'a';
const LIKE_CHAR: char = 'l';
const UNLIKE_CHAR: char = 'r';

/// The three replicated chatroom mutations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventKind {
    Append { username: String, text: String },
    Like { username: String, target: Lts },
    Unlike { username: String, target: Lts },
}

impl EventKind {
    fn type_char(&self) -> char {
        match self {
            EventKind::Append { .. } => APPEND_CHAR,
            EventKind::Like { .. } => LIKE_CHAR,
            EventKind::Unlike { .. } => UNLIKE_CHAR,
        }
    }
}

/// LogRecord is one line of an origin server's update log. The origin is implied by which log the
/// record lives in, so it is not part of the line.
///
/// Line format:
///
/// ```text
/// counter~chatroom~a~username~text
/// counter~chatroom~l~username~target_origin~target_counter
/// counter~chatroom~r~username~target_origin~target_counter
/// ```
///
/// `text` is the last field and may itself contain `~`. Chatroom and user names never do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogRecord {
    pub counter: LamportCounter,
    pub chatroom: String,
    pub kind: EventKind,
}

/// LogEvent is a record together with the server that originated it. Immutable once written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEvent {
    pub origin: ServerId,
    pub record: LogRecord,
}

impl LogEvent {
    pub fn new(origin: ServerId, counter: LamportCounter, chatroom: String, kind: EventKind) -> Self {
        LogEvent {
            origin,
            record: LogRecord {
                counter,
                chatroom,
                kind,
            },
        }
    }

    pub fn counter(&self) -> LamportCounter {
        self.record.counter
    }

    pub fn lts(&self) -> Lts {
        Lts::new(self.origin, self.record.counter)
    }

    pub fn chatroom(&self) -> &str {
        &self.record.chatroom
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}~{}~", self.counter, self.chatroom, self.kind.type_char())?;
        match &self.kind {
            EventKind::Append { username, text } => write!(f, "{}~{}", username, text),
            EventKind::Like { username, target } | EventKind::Unlike { username, target } => {
                write!(f, "{}~{}~{}", username, target.origin, target.counter)
            }
        }
    }
}

impl FromStr for LogRecord {
    type Err = MalformedEntry;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.splitn(4, '~');
        let counter = fields
            .next()
            .and_then(|c| c.parse::<u32>().ok())
            .map(LamportCounter::new)
            .ok_or_else(|| MalformedEntry::new(line, "bad lamport counter"))?;
        let chatroom = fields
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| MalformedEntry::new(line, "missing chatroom"))?;
        let type_field = fields
            .next()
            .ok_or_else(|| MalformedEntry::new(line, "missing event type"))?;
        let payload = fields
            .next()
            .ok_or_else(|| MalformedEntry::new(line, "missing payload"))?;

        let kind = match type_field {
            "a" => {
                let (username, text) = payload
                    .split_once('~')
                    .ok_or_else(|| MalformedEntry::new(line, "append payload needs username and text"))?;
                EventKind::Append {
                    username: username.to_string(),
                    text: text.to_string(),
                }
            }
            "l" | "r" => {
                let (username, target) = parse_like_payload(line, payload)?;
                if type_field == "l" {
                    EventKind::Like { username, target }
                } else {
                    EventKind::Unlike { username, target }
                }
            }
            _ => return Err(MalformedEntry::new(line, "unknown event type")),
        };

        Ok(LogRecord {
            counter,
            chatroom: chatroom.to_string(),
            kind,
        })
    }
}

fn parse_like_payload(line: &str, payload: &str) -> Result<(String, Lts), MalformedEntry> {
    let mut fields = payload.split('~');
    let (username, origin, counter) = match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(u), Some(o), Some(c), None) => (u, o, c),
        _ => return Err(MalformedEntry::new(line, "like payload needs username, origin and counter")),
    };

    let origin = origin
        .parse::<u32>()
        .ok()
        .and_then(|o| ServerId::new(o).ok())
        .ok_or_else(|| MalformedEntry::new(line, "bad target origin"))?;
    let counter = counter
        .parse::<u32>()
        .map_err(|_| MalformedEntry::new(line, "bad target counter"))?;

    Ok((username.to_string(), Lts::new(origin, LamportCounter::new(counter))))
}

impl Entry for LogRecord {
    fn sequence(&self) -> u64 {
        self.counter.as_u32() as u64
    }
}
