mod archive;
mod chatroom;
mod message;
mod participants;
mod store;

pub use archive::ArchiveError;
pub use archive::FileArchive;
pub use archive::HistoryArchive;
pub use archive::InMemoryArchive;
pub use chatroom::Chatroom;
pub use chatroom::RING_CAPACITY;
pub use message::ArchivedMessage;
pub use message::Message;
pub use participants::ParticipantSet;
pub use store::ChatroomSnapshot;
pub use store::ChatroomStore;
pub use store::LikeOutcome;
