use crate::actor::{ActorClient, ActorExited};
use crate::replica::{AntiEntropyTimerHandle, EngineError, EngineStatus, ServerId};
use tokio::task::JoinHandle;

/// ChatServer is a running replica: its event loop, its anti-entropy timer, and a client to talk
/// to it. Dropping it stops the timer. The event loop keeps running for as long as the transport
/// holds on to it.
pub struct ChatServer {
    pub(super) server_id: ServerId,
    pub(super) actor_client: ActorClient,
    pub(super) event_loop: JoinHandle<Result<(), EngineError>>,
    pub(super) _anti_entropy_timer: AntiEntropyTimerHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatServerError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("replica event loop panicked")]
    Panicked,
}

impl ChatServer {
    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub fn actor_client(&self) -> &ActorClient {
        &self.actor_client
    }

    pub async fn status(&self) -> Result<EngineStatus, ActorExited> {
        self.actor_client.status().await
    }

    /// Wait for the event loop to stop, which only happens on a fatal error or once nothing can
    /// reach the replica anymore.
    pub async fn wait(self) -> Result<(), ChatServerError> {
        let ChatServer {
            actor_client,
            event_loop,
            ..
        } = self;
        drop(actor_client);

        match event_loop.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ChatServerError::Panicked),
        }
    }
}
