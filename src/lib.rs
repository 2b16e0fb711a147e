mod actor;
mod api;
mod chatroom;
mod commitlog;
mod replica;
mod transport;
mod wire;

pub use actor::ActorClient;
pub use actor::ActorExited;
pub use api::try_create_chat_server;
pub use api::ChatServer;
pub use api::ChatServerError;
pub use api::ServerConfig;
pub use api::ServerCreationError;
pub use api::ServerOptions;
pub use chatroom::ArchiveError;
pub use chatroom::ArchivedMessage;
pub use chatroom::Chatroom;
pub use chatroom::ChatroomSnapshot;
pub use chatroom::ChatroomStore;
pub use chatroom::FileArchive;
pub use chatroom::HistoryArchive;
pub use chatroom::InMemoryArchive;
pub use chatroom::LikeOutcome;
pub use chatroom::Message;
pub use chatroom::ParticipantSet;
pub use chatroom::RING_CAPACITY;
pub use commitlog::Entry;
pub use commitlog::FileLog;
pub use commitlog::InMemoryLog;
pub use commitlog::Log;
pub use commitlog::LogError;
pub use commitlog::MalformedEntry;
pub use replica::EngineConfig;
pub use replica::EngineError;
pub use replica::EngineStatus;
pub use replica::EventKind;
pub use replica::InvalidServerId;
pub use replica::LamportCounter;
pub use replica::LamportMatrix;
pub use replica::LogEvent;
pub use replica::LogRecord;
pub use replica::Lts;
pub use replica::ReplicationEngine;
pub use replica::ReplicationState;
pub use replica::ServerId;
pub use replica::NUM_SERVERS;
pub use transport::ClientGroup;
pub use transport::Destination;
pub use transport::LocalClient;
pub use transport::LocalHub;
pub use transport::MembershipCause;
pub use transport::Multicast;
pub use transport::MulticastRecorder;
pub use transport::ServerMembershipChange;
pub use transport::TransportError;
pub use wire::ClientRequest;
pub use wire::ClientRequestError;
pub use wire::ClientResponse;
pub use wire::DecodeError;
pub use wire::PeerMessage;
pub use wire::MAX_MESSAGE_LEN;
pub use wire::MAX_NAME_LEN;

