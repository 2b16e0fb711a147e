use crate::replica::{ServerId, NUM_SERVERS};
use std::collections::BTreeSet;

/// ParticipantSet holds a chatroom's users, partitioned by the server they are connected through.
/// The union across servers is the membership clients see.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParticipantSet {
    by_server: [BTreeSet<String>; NUM_SERVERS],
}

impl ParticipantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, server: ServerId, username: &str) -> bool {
        self.by_server[server.index()].insert(username.to_string())
    }

    pub fn remove(&mut self, server: ServerId, username: &str) -> bool {
        self.by_server[server.index()].remove(username)
    }

    /// Drop everyone connected through `server`. Return true if anyone was dropped.
    pub fn purge(&mut self, server: ServerId) -> bool {
        let set = &mut self.by_server[server.index()];
        let changed = !set.is_empty();
        set.clear();
        changed
    }

    /// Replace `server`'s users wholesale. Return true if that changed anything.
    pub fn replace(&mut self, server: ServerId, usernames: BTreeSet<String>) -> bool {
        let set = &mut self.by_server[server.index()];
        if *set == usernames {
            false
        } else {
            *set = usernames;
            true
        }
    }

    pub fn via(&self, server: ServerId) -> &BTreeSet<String> {
        &self.by_server[server.index()]
    }

    pub fn union(&self) -> BTreeSet<String> {
        self.by_server.iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u32) -> ServerId {
        ServerId::new(v).unwrap()
    }

    #[test]
    fn union_merges_servers() {
        let mut participants = ParticipantSet::new();
        assert!(participants.insert(id(1), "alice"));
        assert!(!participants.insert(id(1), "alice"));
        participants.insert(id(2), "alice");
        participants.insert(id(2), "bob");

        let union: Vec<String> = participants.union().into_iter().collect();
        assert_eq!(union, vec!["alice".to_string(), "bob".to_string()]);

        assert!(participants.purge(id(2)));
        assert!(!participants.purge(id(2)));
        assert_eq!(participants.union().len(), 1);

        assert!(participants.remove(id(1), "alice"));
        assert!(participants.union().is_empty());
    }

    #[test]
    fn replace_reports_change() {
        let mut participants = ParticipantSet::new();
        let set: BTreeSet<String> = vec!["carol".to_string()].into_iter().collect();

        assert!(participants.replace(id(3), set.clone()));
        assert!(!participants.replace(id(3), set));
        assert!(participants.via(id(3)).contains("carol"));
    }
}
