use crate::replica::ServerId;
use bytes::Bytes;
use std::fmt;

/// Name of a client's private group. Replies to a single client go here.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ClientGroup(String);

impl ClientGroup {
    pub fn new(name: impl Into<String>) -> Self {
        ClientGroup(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Destination {
    /// Every server, including the sender.
    ServerGroup,
    /// Clients of `chatroom` that are connected through `server`.
    ChatroomClients { server: ServerId, chatroom: String },
    Client(ClientGroup),
}

/// Multicast is the outbound half of the group communication layer.
///
/// Messages sent by one sender to one destination are delivered in send order. Messages to the
/// server group from different senders are delivered in the same relative order everywhere.
/// `send` must not block on the receivers: it is called from inside the event loop.
pub trait Multicast {
    fn send(&mut self, destination: &Destination, message: Bytes) -> Result<(), TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is disconnected")]
    Disconnected,
}

/// MulticastRecorder keeps everything sent through it, in order, instead of delivering it.
#[derive(Debug, Default)]
pub struct MulticastRecorder {
    sent: Vec<(Destination, Bytes)>,
}

impl MulticastRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything sent so far.
    pub fn take(&mut self) -> Vec<(Destination, Bytes)> {
        std::mem::take(&mut self.sent)
    }
}

impl Multicast for MulticastRecorder {
    fn send(&mut self, destination: &Destination, message: Bytes) -> Result<(), TransportError> {
        self.sent.push((destination.clone(), message));
        Ok(())
    }
}
