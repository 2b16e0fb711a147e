use crate::chatroom::HistoryArchive;
use crate::commitlog::Log;
use crate::replica::{EngineError, EngineStatus, LogRecord, ReplicationEngine};
use crate::transport::{ClientGroup, Multicast, ServerMembershipChange};
use bytes::Bytes;
use std::fmt;
use tokio::sync::{mpsc, oneshot};

// Disk interaction is synchronous inside the event loop. Events are handled one at a time, so the
// engine needs no locking.
#[derive(Debug)]
pub(crate) enum Event {
    // From the server group: peer updates, matrices, participant lists.
    PeerMessage(Bytes),

    // From one client's private group.
    ClientMessage { sender: ClientGroup, message: Bytes },

    // Server group membership changed. May move us to RECONCILING.
    ServerMembership(ServerMembershipChange),

    // A client's private group disconnected.
    ClientLeft(ClientGroup),

    // Rebroadcast our matrix if we are reconciling and it changed.
    AntiEntropyTick,

    Status(Callback<EngineStatus>),
}

pub(crate) struct Callback<O>(oneshot::Sender<O>);

impl<O> Callback<O> {
    fn send(self, message: O) {
        let _ = self.0.send(message);
    }
}

impl<O> fmt::Debug for Callback<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("replica event loop has exited")]
pub struct ActorExited;

#[derive(Clone)]
pub struct ActorClient {
    sender: mpsc::Sender<Event>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (ActorClient { sender: tx }, rx)
    }

    pub fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: self.sender.downgrade(),
        }
    }

    pub async fn peer_message(&self, message: Bytes) -> Result<(), ActorExited> {
        self.send(Event::PeerMessage(message)).await
    }

    pub async fn client_message(&self, sender: ClientGroup, message: Bytes) -> Result<(), ActorExited> {
        self.send(Event::ClientMessage { sender, message }).await
    }

    pub async fn server_membership(&self, change: ServerMembershipChange) -> Result<(), ActorExited> {
        self.send(Event::ServerMembership(change)).await
    }

    pub async fn client_left(&self, group: ClientGroup) -> Result<(), ActorExited> {
        self.send(Event::ClientLeft(group)).await
    }

    pub async fn status(&self) -> Result<EngineStatus, ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Status(Callback(tx))).await?;
        rx.await.map_err(|_| ActorExited)
    }

    async fn send(&self, event: Event) -> Result<(), ActorExited> {
        self.sender.send(event).await.map_err(|_| ActorExited)
    }
}

/// WeakActorClient does not keep the actor alive. Used by background tasks that should stop once
/// the actor is gone.
#[derive(Clone)]
pub struct WeakActorClient {
    sender: mpsc::WeakSender<Event>,
}

impl WeakActorClient {
    pub fn upgrade(&self) -> Option<ActorClient> {
        self.sender.upgrade().map(|sender| ActorClient { sender })
    }

    pub(crate) async fn anti_entropy_tick(&self) -> Result<(), ActorExited> {
        let client = self.upgrade().ok_or(ActorExited)?;
        client.send(Event::AntiEntropyTick).await
    }
}

/// ReplicaActor is the replication engine in actor model.
pub struct ReplicaActor<L, A, M>
where
    L: Log<LogRecord>,
    A: HistoryArchive,
    M: Multicast,
{
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    engine: ReplicationEngine<L, A, M>,
}

impl<L, A, M> ReplicaActor<L, A, M>
where
    L: Log<LogRecord>,
    A: HistoryArchive,
    M: Multicast,
{
    pub(crate) fn new(
        logger: slog::Logger,
        receiver: mpsc::Receiver<Event>,
        engine: ReplicationEngine<L, A, M>,
    ) -> Self {
        ReplicaActor {
            logger,
            receiver,
            engine,
        }
    }

    /// Run until every client is dropped, or until the engine hits a fatal error.
    pub async fn run_event_loop(mut self) -> Result<(), EngineError> {
        while let Some(event) = self.receiver.recv().await {
            if let Err(e) = self.handle_event(event) {
                slog::crit!(self.logger, "Stopping replica: {}", e);
                return Err(e);
            }
        }

        slog::info!(self.logger, "Replica event loop finished");
        Ok(())
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and/or come back as an event to this actor.
    fn handle_event(&mut self, event: Event) -> Result<(), EngineError> {
        match event {
            Event::PeerMessage(message) => self.engine.handle_peer_message(message)?,
            Event::ClientMessage { sender, message } => self.engine.handle_client_message(sender, message)?,
            Event::ServerMembership(change) => self.engine.handle_server_membership(change)?,
            Event::ClientLeft(group) => self.engine.handle_client_left(&group),
            Event::AntiEntropyTick => self.engine.anti_entropy_tick(),
            Event::Status(callback) => callback.send(self.engine.status()),
        }

        Ok(())
    }
}
