use crate::chatroom::archive::{ArchiveError, HistoryArchive};
use crate::chatroom::chatroom::Chatroom;
use crate::chatroom::message::{ArchivedMessage, Message};
use crate::chatroom::participants::ParticipantSet;
use crate::replica::{Lts, ServerId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LikeOutcome {
    Applied,
    /// The target is not in the in-memory ring, either because it was evicted to history or
    /// because it has not been delivered yet. Nothing was changed.
    NotResident,
}

/// What clients of a chatroom are shown after every change.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChatroomSnapshot {
    pub chatroom: String,
    pub participants: BTreeSet<String>,
    pub messages: Vec<Message>,
}

/// ChatroomStore owns every chatroom this server knows of, plus the archive their evicted
/// messages go to. Rooms are created on first reference.
pub struct ChatroomStore<A: HistoryArchive> {
    logger: slog::Logger,
    rooms: BTreeMap<String, Chatroom>,
    archive: A,
}

impl<A: HistoryArchive> ChatroomStore<A> {
    pub fn new(logger: slog::Logger, archive: A) -> Self {
        ChatroomStore {
            logger,
            rooms: BTreeMap::new(),
            archive,
        }
    }

    pub fn find_or_create(&mut self, name: &str) -> &mut Chatroom {
        if !self.rooms.contains_key(name) {
            slog::debug!(self.logger, "Creating chatroom '{}'", name);
        }

        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| Chatroom::new(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&Chatroom> {
        self.rooms.get(name)
    }

    pub fn chatroom_names(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    /// Append `message` as the newest message of `chatroom`, evicting the oldest one first if the
    /// ring is full. If eviction fails the ring is left untouched.
    pub fn append_message(&mut self, chatroom: &str, message: Message) -> Result<(), ArchiveError> {
        self.evict_if_full(chatroom)?;
        self.find_or_create(chatroom).write(message);
        Ok(())
    }

    /// If the next append to `chatroom` would overwrite a message, move that message (and its
    /// likers) to the archive and free its slot.
    pub fn evict_if_full(&mut self, chatroom: &str) -> Result<Option<ArchivedMessage>, ArchiveError> {
        let room = self
            .rooms
            .entry(chatroom.to_string())
            .or_insert_with(|| Chatroom::new(chatroom.to_string()));

        let evictee = match room.evictee() {
            Some(evictee) => evictee,
            None => return Ok(None),
        };

        self.archive.archive(chatroom, &evictee)?;
        room.clear_evictee();
        slog::debug!(self.logger, "Archived {:?} from '{}'", evictee.lts, chatroom);

        Ok(Some(evictee))
    }

    pub fn apply_like(&mut self, chatroom: &str, target: Lts, liker: &str) -> LikeOutcome {
        let applied = self.find_or_create(chatroom).like(target, liker);
        self.like_outcome(applied, "like", chatroom, target)
    }

    pub fn apply_unlike(&mut self, chatroom: &str, target: Lts, liker: &str) -> LikeOutcome {
        let applied = self.find_or_create(chatroom).unlike(target, liker);
        self.like_outcome(applied, "unlike", chatroom, target)
    }

    fn like_outcome(&self, applied: bool, action: &str, chatroom: &str, target: Lts) -> LikeOutcome {
        if applied {
            LikeOutcome::Applied
        } else {
            slog::info!(
                self.logger,
                "Ignoring {} of {:?} in '{}': message is not in memory",
                action,
                target,
                chatroom
            );
            LikeOutcome::NotResident
        }
    }

    pub fn snapshot_for_broadcast(&mut self, chatroom: &str) -> ChatroomSnapshot {
        let room = self.find_or_create(chatroom);
        ChatroomSnapshot {
            chatroom: chatroom.to_string(),
            participants: room.participants().union(),
            messages: room.messages(),
        }
    }

    /// The room's complete history: archived messages followed by resident ones, oldest first.
    pub fn history(&self, chatroom: &str) -> Result<Vec<Message>, ArchiveError> {
        let mut messages: Vec<Message> = self
            .archive
            .history(chatroom)?
            .iter()
            .map(ArchivedMessage::to_message)
            .collect();

        if let Some(room) = self.rooms.get(chatroom) {
            messages.extend(room.messages());
        }

        Ok(messages)
    }

    pub fn participants_mut(&mut self, chatroom: &str) -> &mut ParticipantSet {
        self.find_or_create(chatroom).participants_mut()
    }

    /// Drop every participant connected through `server`. Return the rooms that changed.
    pub fn purge_origin_participants(&mut self, server: ServerId) -> Vec<String> {
        self.rooms
            .values_mut()
            .filter_map(|room| {
                if room.participants_mut().purge(server) {
                    Some(room.name().to_string())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Forget all archived history. Only valid while no messages are resident.
    pub(crate) fn reset_archive(&mut self) -> Result<(), ArchiveError> {
        self.archive.reset_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatroom::archive::InMemoryArchive;
    use crate::chatroom::chatroom::RING_CAPACITY;
    use crate::replica::LamportCounter;

    fn id(v: u32) -> ServerId {
        ServerId::new(v).unwrap()
    }

    fn lts(counter: u32) -> Lts {
        Lts::new(id(1), LamportCounter::new(counter))
    }

    fn message(counter: u32) -> Message {
        Message {
            lts: lts(counter),
            username: "alice".to_string(),
            text: format!("message {}", counter),
            like_count: 0,
        }
    }

    fn store() -> ChatroomStore<InMemoryArchive> {
        ChatroomStore::new(slog::Logger::root(slog::Discard, slog::o!()), InMemoryArchive::new())
    }

    fn counters(messages: &[Message]) -> Vec<u32> {
        messages.iter().map(|m| m.lts.counter.as_u32()).collect()
    }

    #[test]
    fn twenty_sixth_append_evicts_oldest() {
        let mut store = store();
        for counter in 1..=RING_CAPACITY as u32 {
            store.append_message("general", message(counter)).unwrap();
        }
        assert!(store.history("general").unwrap().len() == RING_CAPACITY);
        assert_eq!(store.archive.history("general").unwrap().len(), 0);

        store.apply_like("general", lts(1), "bob");
        store.append_message("general", message(26)).unwrap();

        let archived = store.archive.history("general").unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].lts, lts(1));
        assert!(archived[0].likers.contains("bob"));

        let snapshot = store.snapshot_for_broadcast("general");
        assert_eq!(counters(&snapshot.messages), (2..=26).collect::<Vec<u32>>());

        let history = store.history("general").unwrap();
        assert_eq!(counters(&history), (1..=26).collect::<Vec<u32>>());
        assert_eq!(history[0].like_count, 1);
    }

    #[test]
    fn eviction_resets_slot_likers() {
        let mut store = store();
        for counter in 1..=RING_CAPACITY as u32 {
            store.append_message("r", message(counter)).unwrap();
        }
        store.apply_like("r", lts(1), "bob");
        store.append_message("r", message(26)).unwrap();

        // Message 26 reuses message 1's slot but none of its likes.
        let snapshot = store.snapshot_for_broadcast("r");
        let newest = snapshot.messages.last().unwrap();
        assert_eq!(newest.lts, lts(26));
        assert_eq!(newest.like_count, 0);
    }

    #[test]
    fn like_on_evicted_message_is_a_no_op() {
        let mut store = store();
        for counter in 1..=(RING_CAPACITY as u32 + 1) {
            store.append_message("general", message(counter)).unwrap();
        }

        assert_eq!(store.apply_like("general", lts(1), "bob"), LikeOutcome::NotResident);
        assert_eq!(store.apply_unlike("general", lts(1), "bob"), LikeOutcome::NotResident);
        assert!(store.archive.history("general").unwrap()[0].likers.is_empty());

        assert_eq!(store.apply_like("general", lts(2), "bob"), LikeOutcome::Applied);
        assert_eq!(store.snapshot_for_broadcast("general").messages[0].like_count, 1);
    }

    #[test]
    fn likes_are_a_set_per_user() {
        let mut store = store();
        store.append_message("general", message(1)).unwrap();

        store.apply_like("general", lts(1), "bob");
        store.apply_like("general", lts(1), "bob");
        store.apply_like("general", lts(1), "carol");
        assert_eq!(store.snapshot_for_broadcast("general").messages[0].like_count, 2);

        store.apply_unlike("general", lts(1), "bob");
        store.apply_unlike("general", lts(1), "dave");
        assert_eq!(store.snapshot_for_broadcast("general").messages[0].like_count, 1);
    }

    #[test]
    fn purge_reports_changed_rooms() {
        let mut store = store();
        store.participants_mut("a").insert(id(2), "bob");
        store.participants_mut("b").insert(id(3), "carol");
        store.participants_mut("c").insert(id(2), "dave");

        assert_eq!(store.purge_origin_participants(id(2)), vec!["a".to_string(), "c".to_string()]);
        assert!(store.snapshot_for_broadcast("a").participants.is_empty());
        assert_eq!(store.snapshot_for_broadcast("b").participants.len(), 1);
        assert!(store.purge_origin_participants(id(2)).is_empty());
    }
}
