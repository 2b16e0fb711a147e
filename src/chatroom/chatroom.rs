use crate::chatroom::message::{ArchivedMessage, Message};
use crate::chatroom::participants::ParticipantSet;
use crate::replica::Lts;
use std::collections::BTreeSet;

/// Number of recent messages each chatroom keeps in memory.
pub const RING_CAPACITY: usize = 25;

struct Slot {
    message: Message,
    likers: BTreeSet<String>,
}

/// Chatroom holds a room's participants and its most recent messages in a fixed size ring.
///
/// Appends go to `write_cursor`, which then advances. Once the ring is full, the slot under the
/// cursor holds the oldest message, which has to be moved out (see `evictee()`) before the next
/// append overwrites it. Likes can only be applied to messages still in the ring.
pub struct Chatroom {
    name: String,
    ring: Vec<Option<Slot>>,
    write_cursor: usize,
    participants: ParticipantSet,
}

impl Chatroom {
    pub(crate) fn new(name: String) -> Self {
        let mut ring = Vec::with_capacity(RING_CAPACITY);
        ring.resize_with(RING_CAPACITY, || None);

        Chatroom {
            name,
            ring,
            write_cursor: 0,
            participants: ParticipantSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &ParticipantSet {
        &self.participants
    }

    pub(crate) fn participants_mut(&mut self) -> &mut ParticipantSet {
        &mut self.participants
    }

    /// The message the next append would overwrite, with its likers, if the ring is full.
    pub(crate) fn evictee(&self) -> Option<ArchivedMessage> {
        self.ring[self.write_cursor].as_ref().map(|slot| ArchivedMessage {
            lts: slot.message.lts,
            username: slot.message.username.clone(),
            text: slot.message.text.clone(),
            likers: slot.likers.clone(),
        })
    }

    /// Empty the slot under the write cursor, likers included.
    pub(crate) fn clear_evictee(&mut self) {
        self.ring[self.write_cursor] = None;
    }

    /// Write into the slot under the cursor and advance. The caller must have moved any previous
    /// occupant out first.
    pub(crate) fn write(&mut self, message: Message) {
        debug_assert!(self.ring[self.write_cursor].is_none(), "overwriting a message that was not evicted");

        self.ring[self.write_cursor] = Some(Slot {
            message,
            likers: BTreeSet::new(),
        });
        self.write_cursor = (self.write_cursor + 1) % RING_CAPACITY;
    }

    /// Return false if the target message is not resident.
    pub(crate) fn like(&mut self, target: Lts, liker: &str) -> bool {
        match self.slot_mut(target) {
            Some(slot) => {
                slot.likers.insert(liker.to_string());
                true
            }
            None => false,
        }
    }

    /// Return false if the target message is not resident.
    pub(crate) fn unlike(&mut self, target: Lts, liker: &str) -> bool {
        match self.slot_mut(target) {
            Some(slot) => {
                slot.likers.remove(liker);
                true
            }
            None => false,
        }
    }

    fn slot_mut(&mut self, target: Lts) -> Option<&mut Slot> {
        self.ring
            .iter_mut()
            .flatten()
            .find(|slot| slot.message.lts == target)
    }

    /// Resident messages, oldest first, with current like counts.
    pub fn messages(&self) -> Vec<Message> {
        (0..RING_CAPACITY)
            .map(|offset| (self.write_cursor + offset) % RING_CAPACITY)
            .filter_map(|i| self.ring[i].as_ref())
            .map(|slot| Message {
                like_count: slot.likers.len() as u32,
                ..slot.message.clone()
            })
            .collect()
    }
}
