use crate::chatroom::ParticipantSet;
use crate::replica::{LamportCounter, LamportMatrix, LogEvent, LogRecord, ServerId, NUM_SERVERS};
use crate::wire::codec::{DecodeError, Decoder, Encoder};
use bytes::Bytes;
use std::collections::BTreeSet;

const SERVER_UPDATE_TAG: u8 = b's';
const ANTI_ENTROPY_TAG: u8 = b'e';
const PARTICIPANT_UPDATE_TAG: u8 = b'p';

/// Messages exchanged between servers on the server group.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PeerMessage {
    /// `sender`'s full knowledge of who is in `chatroom`, per server.
    ParticipantUpdate {
        sender: ServerId,
        chatroom: String,
        participants: ParticipantSet,
    },
    /// One replicated event. `event.origin` can differ from `sender` when the event is a resend.
    ServerUpdate { sender: ServerId, event: LogEvent },
    AntiEntropy { sender: ServerId, matrix: LamportMatrix },
}

impl PeerMessage {
    pub fn sender(&self) -> ServerId {
        match self {
            PeerMessage::ParticipantUpdate { sender, .. }
            | PeerMessage::ServerUpdate { sender, .. }
            | PeerMessage::AntiEntropy { sender, .. } => *sender,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            PeerMessage::ParticipantUpdate {
                sender,
                chatroom,
                participants,
            } => {
                let mut encoder = Encoder::new(PARTICIPANT_UPDATE_TAG);
                encoder.put_u32(sender.as_u32()).put_str(chatroom);
                for server in ServerId::all() {
                    let usernames = participants.via(server);
                    encoder.put_len(usernames.len());
                    for username in usernames {
                        encoder.put_str(username);
                    }
                }
                encoder.finish()
            }
            PeerMessage::ServerUpdate { sender, event } => {
                let mut encoder = Encoder::new(SERVER_UPDATE_TAG);
                encoder
                    .put_u32(sender.as_u32())
                    .put_u32(event.origin.as_u32())
                    .put_str(&event.record.to_string());
                encoder.finish()
            }
            PeerMessage::AntiEntropy { sender, matrix } => {
                let mut encoder = Encoder::new(ANTI_ENTROPY_TAG);
                encoder.put_u32(sender.as_u32());
                for row in matrix.cells() {
                    for cell in row {
                        encoder.put_u32(cell.as_u32());
                    }
                }
                encoder.finish()
            }
        }
    }

    pub fn decode(bytes: Bytes) -> Result<Self, DecodeError> {
        let (tag, mut decoder) = Decoder::new(bytes)?;
        let sender = get_server_id(&mut decoder)?;

        let message = match tag {
            PARTICIPANT_UPDATE_TAG => {
                let chatroom = decoder.get_str()?;
                let mut participants = ParticipantSet::new();
                for server in ServerId::all() {
                    let count = decoder.get_len(4)?;
                    let mut usernames = BTreeSet::new();
                    for _ in 0..count {
                        usernames.insert(decoder.get_str()?);
                    }
                    participants.replace(server, usernames);
                }
                PeerMessage::ParticipantUpdate {
                    sender,
                    chatroom,
                    participants,
                }
            }
            SERVER_UPDATE_TAG => {
                let origin = get_server_id(&mut decoder)?;
                let line = decoder.get_str()?;
                let record = line.parse::<LogRecord>().map_err(|e| DecodeError::InvalidField {
                    field: "log line",
                    value: e.to_string(),
                })?;
                PeerMessage::ServerUpdate {
                    sender,
                    event: LogEvent { origin, record },
                }
            }
            ANTI_ENTROPY_TAG => {
                let mut cells = [[LamportCounter::zero(); NUM_SERVERS]; NUM_SERVERS];
                for row in cells.iter_mut() {
                    for cell in row.iter_mut() {
                        *cell = LamportCounter::new(decoder.get_u32()?);
                    }
                }
                PeerMessage::AntiEntropy {
                    sender,
                    matrix: LamportMatrix::from_cells(cells),
                }
            }
            other => return Err(DecodeError::UnknownTag(other)),
        };

        decoder.finish()?;
        Ok(message)
    }
}

pub(crate) fn get_server_id(decoder: &mut Decoder) -> Result<ServerId, DecodeError> {
    let raw = decoder.get_u32()?;
    ServerId::new(raw).map_err(|e| DecodeError::InvalidField {
        field: "server id",
        value: e.to_string(),
    })
}
