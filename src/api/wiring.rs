use crate::actor::{ActorClient, ReplicaActor};
use crate::api::chat_server::ChatServer;
use crate::api::options::ServerOptionsValidated;
use crate::chatroom::FileArchive;
use crate::commitlog::FileLog;
use crate::replica::{AntiEntropyTimerHandle, EngineConfig, EngineError, LogRecord, ReplicationEngine, ServerId};
use crate::transport::{LocalHub, TransportError};
use crate::ServerOptions;
use std::convert::TryFrom;
use std::fs;
use std::io;

pub struct ServerConfig {
    pub server_id: ServerId,
    pub logger: slog::Logger,
    pub options: ServerOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerCreationError {
    #[error("Illegal options for configuring server: {0}")]
    IllegalOptions(String),
    #[error("Failed to prepare data directory: {0}")]
    DataDirectory(io::Error),
    #[error("Startup recovery failed: {0}")]
    Recovery(#[from] EngineError),
    #[error("Failed to join the server group: {0}")]
    Transport(#[from] TransportError),
}

/// Start a chat server on `hub`: open its files, rebuild its chatrooms, start its event loop and
/// anti-entropy timer, and join the server group.
///
/// Must be called from within a tokio runtime.
pub fn try_create_chat_server(config: ServerConfig, hub: &LocalHub) -> Result<ChatServer, ServerCreationError> {
    let root_logger = config.logger;
    let me = config.server_id;

    let options = ServerOptionsValidated::try_from(config.options)
        .map_err(|e| ServerCreationError::IllegalOptions(e.to_string()))?;

    fs::create_dir_all(&options.data_directory).map_err(ServerCreationError::DataDirectory)?;

    let data_directory = options.data_directory.clone();
    let recreate = options.recreate_files;
    let engine = ReplicationEngine::open(
        EngineConfig {
            logger: root_logger.clone(),
            server_id: me,
            resend_batch_size: options.resend_batch_size,
        },
        |origin| FileLog::<LogRecord>::open(data_directory.join(format!("{}_server{}.log", me, origin)), recreate),
        FileArchive::new(options.data_directory.clone(), me),
        hub.clone(),
    )?;

    let (actor_client, actor_queue_rx) = ActorClient::new(options.actor_queue_size);

    let logger = root_logger.new(slog::o!("ServerId" => me.as_u32()));
    let replica_actor = ReplicaActor::new(logger, actor_queue_rx, engine);
    let event_loop = tokio::spawn(replica_actor.run_event_loop());

    let anti_entropy_timer =
        AntiEntropyTimerHandle::spawn_timer_task(options.anti_entropy_interval, actor_client.weak());

    hub.register_server(me, actor_client.clone())?;

    Ok(ChatServer {
        server_id: me,
        actor_client,
        event_loop,
        _anti_entropy_timer: anti_entropy_timer,
    })
}
