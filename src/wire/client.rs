use crate::chatroom::Message;
use crate::replica::{LamportCounter, Lts, ServerId, NUM_SERVERS};
use crate::wire::codec::{DecodeError, Decoder, Encoder};
use crate::wire::peer::get_server_id;
use bytes::Bytes;
use std::collections::BTreeSet;

const JOIN_TAG: u8 = b'j';
const APPEND_TAG: u8 = b'a';
const LIKE_TAG: u8 = b'l';
const UNLIKE_TAG: u8 = b'r';
const HISTORY_TAG: u8 = b'h';
const MEMBERSHIP_STATUS_TAG: u8 = b'v';

const CLIENT_UPDATE_TAG: u8 = b'i';
const HISTORY_RESPONSE_TAG: u8 = b'H';
const MEMBERSHIP_STATUS_RESPONSE_TAG: u8 = b'm';

/// Usernames and chatroom names are limited to this many bytes.
pub const MAX_NAME_LEN: usize = 79;

/// Requests a client sends to the server it is connected to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientRequest {
    Join { username: String, chatroom: String },
    Append { username: String, chatroom: String, text: String },
    Like { username: String, chatroom: String, target: Lts },
    Unlike { username: String, chatroom: String, target: Lts },
    History { chatroom: String },
    MembershipStatus,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientRequestError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} is longer than {} bytes", MAX_NAME_LEN)]
    TooLong(&'static str),
    #[error("{field} contains forbidden character {character:?}")]
    ForbiddenCharacter { field: &'static str, character: char },
    #[error("{0} must not be '.' or '..'")]
    Reserved(&'static str),
}

impl ClientRequest {
    pub fn encode(&self) -> Bytes {
        match self {
            ClientRequest::Join { username, chatroom } => {
                let mut encoder = Encoder::new(JOIN_TAG);
                encoder.put_str(username).put_str(chatroom);
                encoder.finish()
            }
            ClientRequest::Append {
                username,
                chatroom,
                text,
            } => {
                let mut encoder = Encoder::new(APPEND_TAG);
                encoder.put_str(username).put_str(chatroom).put_str(text);
                encoder.finish()
            }
            ClientRequest::Like {
                username,
                chatroom,
                target,
            }
            | ClientRequest::Unlike {
                username,
                chatroom,
                target,
            } => {
                let tag = if matches!(self, ClientRequest::Like { .. }) {
                    LIKE_TAG
                } else {
                    UNLIKE_TAG
                };
                let mut encoder = Encoder::new(tag);
                encoder
                    .put_str(username)
                    .put_str(chatroom)
                    .put_u32(target.origin.as_u32())
                    .put_u32(target.counter.as_u32());
                encoder.finish()
            }
            ClientRequest::History { chatroom } => {
                let mut encoder = Encoder::new(HISTORY_TAG);
                encoder.put_str(chatroom);
                encoder.finish()
            }
            ClientRequest::MembershipStatus => Encoder::new(MEMBERSHIP_STATUS_TAG).finish(),
        }
    }

    pub fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        let (tag, mut decoder) = Decoder::new(bytes)?;

        let request = match tag {
            JOIN_TAG => ClientRequest::Join {
                username: decoder.get_str()?,
                chatroom: decoder.get_str()?,
            },
            APPEND_TAG => ClientRequest::Append {
                username: decoder.get_str()?,
                chatroom: decoder.get_str()?,
                text: decoder.get_str()?,
            },
            LIKE_TAG | UNLIKE_TAG => {
                let username = decoder.get_str()?;
                let chatroom = decoder.get_str()?;
                let target = Lts::new(get_server_id(&mut decoder)?, LamportCounter::new(decoder.get_u32()?));
                if tag == LIKE_TAG {
                    ClientRequest::Like {
                        username,
                        chatroom,
                        target,
                    }
                } else {
                    ClientRequest::Unlike {
                        username,
                        chatroom,
                        target,
                    }
                }
            }
            HISTORY_TAG => ClientRequest::History {
                chatroom: decoder.get_str()?,
            },
            MEMBERSHIP_STATUS_TAG => ClientRequest::MembershipStatus,
            other => return Err(DecodeError::UnknownTag(other)),
        };

        decoder.finish()?;
        Ok(request)
    }

    /// Check that every name and text field can be stored in the log and history files.
    pub fn validate(&self) -> Result<(), ClientRequestError> {
        match self {
            ClientRequest::Join { username, chatroom }
            | ClientRequest::Like { username, chatroom, .. }
            | ClientRequest::Unlike { username, chatroom, .. } => {
                validate_name("username", username)?;
                validate_name("chatroom", chatroom)
            }
            ClientRequest::Append {
                username,
                chatroom,
                text,
            } => {
                validate_name("username", username)?;
                validate_name("chatroom", chatroom)?;
                validate_text(text)
            }
            ClientRequest::History { chatroom } => validate_name("chatroom", chatroom),
            ClientRequest::MembershipStatus => Ok(()),
        }
    }

    /// Requests that change replicated state. These wait while the server is reconciling.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ClientRequest::Append { .. } | ClientRequest::Like { .. } | ClientRequest::Unlike { .. }
        )
    }
}

// Names appear as fields in log lines, in comma separated liker lists, and in history file names.
fn validate_name(field: &'static str, value: &str) -> Result<(), ClientRequestError> {
    if value.is_empty() {
        return Err(ClientRequestError::Empty(field));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ClientRequestError::TooLong(field));
    }
    if value == "." || value == ".." {
        return Err(ClientRequestError::Reserved(field));
    }
    match value
        .chars()
        .find(|c| matches!(c, '~' | ',' | '/' | '\\') || c.is_control())
    {
        Some(character) => Err(ClientRequestError::ForbiddenCharacter { field, character }),
        None => Ok(()),
    }
}

// Text is always the last field of a line, so it may hold '~' but not line breaks.
fn validate_text(text: &str) -> Result<(), ClientRequestError> {
    if text.is_empty() {
        return Err(ClientRequestError::Empty("text"));
    }
    match text.chars().find(|c| matches!(c, '\n' | '\r')) {
        Some(character) => Err(ClientRequestError::ForbiddenCharacter {
            field: "text",
            character,
        }),
        None => Ok(()),
    }
}

/// Messages a server sends to clients.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientResponse {
    /// Current state of the chatroom a client is in.
    ClientUpdate {
        participants: BTreeSet<String>,
        messages: Vec<Message>,
    },
    HistoryResponse { messages: Vec<Message> },
    MembershipStatusResponse { present: [bool; NUM_SERVERS] },
}

impl ClientResponse {
    pub fn encode(&self) -> Bytes {
        match self {
            ClientResponse::ClientUpdate {
                participants,
                messages,
            } => {
                let mut encoder = Encoder::new(CLIENT_UPDATE_TAG);
                encoder.put_len(participants.len());
                for username in participants {
                    encoder.put_str(username);
                }
                put_messages(&mut encoder, messages);
                encoder.finish()
            }
            ClientResponse::HistoryResponse { messages } => {
                let mut encoder = Encoder::new(HISTORY_RESPONSE_TAG);
                put_messages(&mut encoder, messages);
                encoder.finish()
            }
            ClientResponse::MembershipStatusResponse { present } => {
                let mut encoder = Encoder::new(MEMBERSHIP_STATUS_RESPONSE_TAG);
                encoder.put_len(present.len());
                for flag in present {
                    encoder.put_u8(*flag as u8);
                }
                encoder.finish()
            }
        }
    }

    pub fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        let (tag, mut decoder) = Decoder::new(bytes)?;

        let response = match tag {
            CLIENT_UPDATE_TAG => {
                let count = decoder.get_len(4)?;
                let mut participants = BTreeSet::new();
                for _ in 0..count {
                    participants.insert(decoder.get_str()?);
                }
                ClientResponse::ClientUpdate {
                    participants,
                    messages: get_messages(&mut decoder)?,
                }
            }
            HISTORY_RESPONSE_TAG => ClientResponse::HistoryResponse {
                messages: get_messages(&mut decoder)?,
            },
            MEMBERSHIP_STATUS_RESPONSE_TAG => {
                let count = decoder.get_len(1)?;
                if count != NUM_SERVERS {
                    return Err(DecodeError::InvalidField {
                        field: "server count",
                        value: count.to_string(),
                    });
                }
                let mut present = [false; NUM_SERVERS];
                for flag in present.iter_mut() {
                    *flag = decoder.get_u8()? != 0;
                }
                ClientResponse::MembershipStatusResponse { present }
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };

        decoder.finish()?;
        Ok(response)
    }
}

fn put_messages(encoder: &mut Encoder, messages: &[Message]) {
    encoder.put_len(messages.len());
    for message in messages {
        encoder
            .put_u32(message.lts.origin.as_u32())
            .put_u32(message.lts.counter.as_u32())
            .put_str(&message.username)
            .put_str(&message.text)
            .put_u32(message.like_count);
    }
}

fn get_messages(decoder: &mut Decoder) -> Result<Vec<Message>, DecodeError> {
    // origin, counter, two string lengths and the like count.
    let count = decoder.get_len(20)?;
    let mut messages = Vec::with_capacity(count);
    for _ in 0..count {
        let origin: ServerId = get_server_id(decoder)?;
        let counter = LamportCounter::new(decoder.get_u32()?);
        messages.push(Message {
            lts: Lts::new(origin, counter),
            username: decoder.get_str()?,
            text: decoder.get_str()?,
            like_count: decoder.get_u32()?,
        });
    }
    Ok(messages)
}
