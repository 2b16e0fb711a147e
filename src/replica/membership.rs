use crate::replica::ids::{ServerId, NUM_SERVERS};

/// ServerMembership tracks which servers are currently in the server group. This server always
/// counts itself as present.
#[derive(Debug)]
pub(crate) struct ServerMembership {
    me: ServerId,
    present: [bool; NUM_SERVERS],
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct MembershipDelta {
    pub(crate) joined: Vec<ServerId>,
    pub(crate) left: Vec<ServerId>,
}

impl ServerMembership {
    pub(crate) fn new(me: ServerId) -> Self {
        let mut present = [false; NUM_SERVERS];
        present[me.index()] = true;
        ServerMembership { me, present }
    }

    /// Replace the member list and report who joined or left relative to the previous one.
    pub(crate) fn apply(&mut self, members: &[ServerId]) -> MembershipDelta {
        let mut next = [false; NUM_SERVERS];
        for member in members {
            next[member.index()] = true;
        }
        next[self.me.index()] = true;

        let mut delta = MembershipDelta::default();
        for server in ServerId::all() {
            match (self.present[server.index()], next[server.index()]) {
                (false, true) => delta.joined.push(server),
                (true, false) => delta.left.push(server),
                _ => {}
            }
        }

        self.present = next;
        delta
    }

    pub(crate) fn is_present(&self, server: ServerId) -> bool {
        self.present[server.index()]
    }

    /// Present servers in id order, this one included.
    pub(crate) fn present_members(&self) -> impl Iterator<Item = ServerId> + '_ {
        ServerId::all().filter(move |s| self.is_present(*s))
    }

    pub(crate) fn present_peers(&self) -> impl Iterator<Item = ServerId> + '_ {
        let me = self.me;
        self.present_members().filter(move |s| *s != me)
    }

    pub(crate) fn count(&self) -> usize {
        self.present.iter().filter(|p| **p).count()
    }

    pub(crate) fn flags(&self) -> [bool; NUM_SERVERS] {
        self.present
    }
}
