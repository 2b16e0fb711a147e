use crate::transport::ClientGroup;
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Session {
    pub(crate) username: String,
    pub(crate) chatroom: String,
}

/// The clients connected to this server, keyed by their private group. A user can be connected
/// through several clients at once.
#[derive(Debug, Default)]
pub(crate) struct ClientSessions {
    by_group: HashMap<ClientGroup, Session>,
}

impl ClientSessions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bind `group` to `username` in `chatroom`, returning the session it replaces.
    pub(crate) fn bind(&mut self, group: ClientGroup, username: &str, chatroom: &str) -> Option<Session> {
        self.by_group.insert(
            group,
            Session {
                username: username.to_string(),
                chatroom: chatroom.to_string(),
            },
        )
    }

    pub(crate) fn remove(&mut self, group: &ClientGroup) -> Option<Session> {
        self.by_group.remove(group)
    }

    /// Whether any client still has `username` in `chatroom`.
    pub(crate) fn user_in_room(&self, username: &str, chatroom: &str) -> bool {
        self.by_group
            .values()
            .any(|s| s.username == username && s.chatroom == chatroom)
    }
}
