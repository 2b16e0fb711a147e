mod anti_entropy;
mod client_sessions;
mod ids;
mod lamport_matrix;
mod membership;
mod replication_engine;
mod replication_state;
mod update_log;

pub use ids::InvalidServerId;
pub use ids::LamportCounter;
pub use ids::Lts;
pub use ids::ServerId;
pub use ids::NUM_SERVERS;
pub use lamport_matrix::LamportMatrix;
pub use replication_engine::EngineConfig;
pub use replication_engine::EngineError;
pub use replication_engine::EngineStatus;
pub use replication_engine::ReplicationEngine;
pub use replication_state::ReplicationState;
pub use update_log::EventKind;
pub use update_log::LogEvent;
pub use update_log::LogRecord;

pub(crate) use anti_entropy::AntiEntropyTimerHandle;
