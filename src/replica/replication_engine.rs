use crate::chatroom::{
    ArchiveError, ChatroomSnapshot, ChatroomStore, HistoryArchive, LikeOutcome, Message, ParticipantSet,
};
use crate::commitlog::{Log, LogError};
use crate::replica::anti_entropy::{self, ResendRange};
use crate::replica::client_sessions::{ClientSessions, Session};
use crate::replica::ids::{LamportCounter, ServerId, NUM_SERVERS};
use crate::replica::lamport_matrix::{LamportClock, LamportMatrix};
use crate::replica::membership::ServerMembership;
use crate::replica::replication_state::{PendingUpdateQueue, ReplicationState};
use crate::replica::update_log::{merge_order, EventKind, LogEvent, LogRecord, UpdateLog};
use crate::transport::{ClientGroup, Destination, Multicast, ServerMembershipChange};
use crate::wire::{ClientRequest, ClientResponse, DecodeError, PeerMessage};
use bytes::Bytes;

pub struct EngineConfig {
    pub logger: slog::Logger,
    pub server_id: ServerId,
    /// Resends read the log in pages of this many events.
    pub resend_batch_size: usize,
}

/// Failures the engine cannot continue from.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] DecodeError),
    #[error("update log failure: {0}")]
    Log(#[from] LogError),
    #[error("chatroom history failure: {0}")]
    Archive(#[from] ArchiveError),
}

/// Point in time view of an engine, for status queries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineStatus {
    pub server_id: ServerId,
    pub state: ReplicationState,
    pub matrix: LamportMatrix,
    pub present: [bool; NUM_SERVERS],
    pub pending_requests: usize,
}

/// ReplicationEngine is one server's replica of every chatroom, and the logic that keeps it in
/// sync with the other servers.
///
/// Every event this server originates or receives goes to the update log of its origin first, and
/// is applied to the chatrooms afterwards, in the order given by `merge_order()`. While
/// reconciling, received events are only logged, and get applied once every present server
/// reports the same knowledge.
///
/// All handlers run to completion on the caller's thread. Errors they return are fatal.
pub struct ReplicationEngine<L, A, M>
where
    L: Log<LogRecord>,
    A: HistoryArchive,
    M: Multicast,
{
    logger: slog::Logger,
    me: ServerId,
    state: ReplicationState,
    matrix: LamportMatrix,
    clock: LamportClock,
    // Per origin, the latest counter applied to the chatroom store.
    processed: [LamportCounter; NUM_SERVERS],
    update_log: UpdateLog<L>,
    store: ChatroomStore<A>,
    membership: ServerMembership,
    sessions: ClientSessions,
    pending: PendingUpdateQueue,
    transport: M,
    // Peers that joined and whose matrix we have not received since. Until we have, our copy of
    // their row is stale and cannot satisfy the primary condition.
    awaiting_matrix: [bool; NUM_SERVERS],
    // Our row as of the last matrix broadcast.
    last_broadcast_row: Option<[LamportCounter; NUM_SERVERS]>,
    // Set when a peer sends us its matrix. Peers still reconciling may be waiting for our row even
    // though we are PRIMARY, so we keep broadcasting changes until our rows agree.
    exchange_active: bool,
    resend_batch_size: usize,
}

impl<L, A, M> ReplicationEngine<L, A, M>
where
    L: Log<LogRecord>,
    A: HistoryArchive,
    M: Multicast,
{
    /// Open the update log (one stream per origin, using `open_stream`) and rebuild all chatrooms
    /// from it.
    pub fn open<F>(config: EngineConfig, open_stream: F, archive: A, transport: M) -> Result<Self, EngineError>
    where
        F: FnMut(ServerId) -> Result<L, LogError>,
    {
        let logger = config.logger.new(slog::o!("ServerId" => config.server_id.as_u32()));
        let update_log = UpdateLog::open(open_stream)?;
        let store = ChatroomStore::new(logger.clone(), archive);

        let mut engine = ReplicationEngine {
            logger,
            me: config.server_id,
            state: ReplicationState::Primary,
            matrix: LamportMatrix::new(),
            clock: LamportClock::new(),
            processed: [LamportCounter::zero(); NUM_SERVERS],
            update_log,
            store,
            membership: ServerMembership::new(config.server_id),
            sessions: ClientSessions::new(),
            pending: PendingUpdateQueue::new(),
            transport,
            awaiting_matrix: [false; NUM_SERVERS],
            last_broadcast_row: None,
            exchange_active: false,
            resend_batch_size: config.resend_batch_size.max(1),
        };
        engine.recover()?;

        Ok(engine)
    }

    /// Startup reconstruction: chatrooms are a pure function of the update log, so drop archived
    /// history and apply every logged event again.
    fn recover(&mut self) -> Result<(), EngineError> {
        self.store.reset_archive()?;

        let mut streams = Vec::with_capacity(NUM_SERVERS);
        for origin in ServerId::all() {
            let latest = self.update_log.latest_counter(origin);
            self.matrix.raise(self.me, origin, latest);
            self.clock.witness(latest);
            streams.push(self.update_log.replay_all(origin)?);
        }

        let events = merge_order(streams);
        slog::info!(
            self.logger,
            "Recovered {} events from the update log. Matrix row: {:?}",
            events.len(),
            self.matrix.row(self.me)
        );
        for event in events {
            self.apply_event(&event, false)?;
        }

        Ok(())
    }

    pub fn server_id(&self) -> ServerId {
        self.me
    }

    pub fn state(&self) -> ReplicationState {
        self.state
    }

    pub fn matrix(&self) -> &LamportMatrix {
        &self.matrix
    }

    pub fn chatrooms(&self) -> &ChatroomStore<A> {
        &self.store
    }

    pub fn transport_mut(&mut self) -> &mut M {
        &mut self.transport
    }

    pub fn logged_events(&self, origin: ServerId) -> Result<Vec<LogEvent>, EngineError> {
        Ok(self.update_log.replay_all(origin)?)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            server_id: self.me,
            state: self.state,
            matrix: self.matrix.clone(),
            present: self.membership.flags(),
            pending_requests: self.pending.len(),
        }
    }

    // ----- inbound: clients -----

    /// Undecodable client requests are dropped. Only one client sent them.
    pub fn handle_client_message(&mut self, sender: ClientGroup, message: Bytes) -> Result<(), EngineError> {
        match ClientRequest::decode(message) {
            Ok(request) => self.handle_client_request(sender, request),
            Err(e) => {
                slog::warn!(self.logger, "Dropping undecodable request from {:?}: {}", sender, e);
                Ok(())
            }
        }
    }

    pub fn handle_client_request(&mut self, sender: ClientGroup, request: ClientRequest) -> Result<(), EngineError> {
        if let Err(e) = request.validate() {
            slog::warn!(self.logger, "Dropping invalid request from {:?}: {}", sender, e);
            return Ok(());
        }

        if request.is_mutation() && self.state == ReplicationState::Reconciling {
            slog::debug!(self.logger, "Reconciling. Queueing request from {:?}", sender);
            self.pending.push(sender, request);
            return Ok(());
        }

        match request {
            ClientRequest::Join { username, chatroom } => self.join(sender, &username, &chatroom),
            ClientRequest::Append {
                username,
                chatroom,
                text,
            } => self.originate(chatroom, EventKind::Append { username, text })?,
            ClientRequest::Like {
                username,
                chatroom,
                target,
            } => self.originate(chatroom, EventKind::Like { username, target })?,
            ClientRequest::Unlike {
                username,
                chatroom,
                target,
            } => self.originate(chatroom, EventKind::Unlike { username, target })?,
            ClientRequest::History { chatroom } => self.send_history(sender, &chatroom),
            ClientRequest::MembershipStatus => {
                let response = ClientResponse::MembershipStatusResponse {
                    present: self.membership.flags(),
                };
                self.send(&Destination::Client(sender), response.encode());
            }
        }

        Ok(())
    }

    /// A client's private group went away.
    pub fn handle_client_left(&mut self, group: &ClientGroup) {
        if let Some(session) = self.sessions.remove(group) {
            slog::info!(self.logger, "Client {:?} ({}) left", group, session.username);
            self.leave_room(&session);
        }
    }

    fn join(&mut self, sender: ClientGroup, username: &str, chatroom: &str) {
        let previous = self.sessions.bind(sender, username, chatroom);
        if let Some(previous) = previous {
            if previous.username != username || previous.chatroom != chatroom {
                self.leave_room(&previous);
            }
        }

        slog::info!(self.logger, "'{}' joined '{}'", username, chatroom);
        if self.store.participants_mut(chatroom).insert(self.me, username) {
            self.broadcast_participants(chatroom);
        }
        self.publish_snapshot(chatroom);
    }

    fn leave_room(&mut self, session: &Session) {
        if self.sessions.user_in_room(&session.username, &session.chatroom) {
            return;
        }

        if self
            .store
            .participants_mut(&session.chatroom)
            .remove(self.me, &session.username)
        {
            self.broadcast_participants(&session.chatroom);
            self.publish_snapshot(&session.chatroom);
        }
    }

    fn send_history(&mut self, sender: ClientGroup, chatroom: &str) {
        match self.store.history(chatroom) {
            Ok(messages) => {
                let response = ClientResponse::HistoryResponse { messages };
                self.send(&Destination::Client(sender), response.encode());
            }
            Err(e) => slog::error!(self.logger, "Failed to read history of '{}': {}", chatroom, e),
        }
    }

    /// Stamp a new event from this server, log it, replicate it, and apply it.
    fn originate(&mut self, chatroom: String, kind: EventKind) -> Result<(), EngineError> {
        let counter = match self.clock.tick() {
            Some(counter) => counter,
            None => {
                slog::error!(
                    self.logger,
                    "Lamport counter exhausted. Dropping update to '{}'",
                    chatroom
                );
                return Ok(());
            }
        };
        let event = LogEvent::new(self.me, counter, chatroom, kind);

        self.update_log.append(&event)?;
        self.matrix.raise(self.me, self.me, counter);
        slog::debug!(self.logger, "Originated {:?}", event.lts());

        let message = PeerMessage::ServerUpdate {
            sender: self.me,
            event,
        };
        self.send(&Destination::ServerGroup, message.encode());

        self.apply_unprocessed()
    }

    // ----- inbound: servers -----

    pub fn handle_peer_message(&mut self, message: Bytes) -> Result<(), EngineError> {
        let message = PeerMessage::decode(message)?;
        if message.sender() == self.me {
            return Ok(());
        }

        match message {
            PeerMessage::ServerUpdate { sender, event } => self.handle_server_update(sender, event),
            PeerMessage::AntiEntropy { sender, matrix } => self.handle_anti_entropy(sender, &matrix),
            PeerMessage::ParticipantUpdate {
                sender,
                chatroom,
                participants,
            } => {
                self.handle_participant_update(sender, &chatroom, participants);
                Ok(())
            }
        }
    }

    fn handle_server_update(&mut self, sender: ServerId, event: LogEvent) -> Result<(), EngineError> {
        let origin = event.origin;
        let counter = event.counter();

        // The sender has everything from origin up to this event.
        self.matrix.raise(sender, origin, counter);

        if counter <= self.matrix.get(self.me, origin) {
            slog::trace!(self.logger, "Discarding already known {:?} from {:?}", event.lts(), sender);
        } else {
            self.update_log.append(&event)?;
            self.matrix.raise(self.me, origin, counter);
            self.clock.witness(counter);

            if self.state == ReplicationState::Primary {
                self.apply_unprocessed()?;
            }
        }

        self.try_become_primary()
    }

    fn handle_anti_entropy(&mut self, sender: ServerId, received: &LamportMatrix) -> Result<(), EngineError> {
        slog::debug!(self.logger, "Anti-entropy from {:?}: {:?}", sender, received);
        self.awaiting_matrix[sender.index()] = false;
        self.exchange_active = true;
        let outdated = anti_entropy::merge_received_matrix(&mut self.matrix, self.me, sender, received);

        for target in ServerId::all() {
            if let Some(range) = anti_entropy::responsible_to_resend(&self.matrix, &self.membership, self.me, target) {
                self.resend(range)?;
            }
        }

        if outdated {
            self.broadcast_matrix();
        }

        self.try_become_primary()
    }

    fn handle_participant_update(
        &mut self,
        sender: ServerId,
        chatroom: &str,
        received: ParticipantSet,
    ) {
        let mut changed = false;
        for server in ServerId::all() {
            // First hand from the sender, second hand only for servers that cannot speak for
            // themselves. Our own set is ours alone.
            let adopt = server != self.me && (server == sender || !self.membership.is_present(server));
            if adopt {
                let usernames = received.via(server).clone();
                changed |= self.store.participants_mut(chatroom).replace(server, usernames);
            }
        }

        if changed {
            self.publish_snapshot(chatroom);
        }
    }

    pub fn handle_server_membership(&mut self, change: ServerMembershipChange) -> Result<(), EngineError> {
        let delta = self.membership.apply(&change.members);
        slog::info!(
            self.logger,
            "Server membership {:?}: {:?}. Joined {:?}, left {:?}",
            change.cause,
            change.members,
            delta.joined,
            delta.left
        );

        for server in &delta.left {
            self.awaiting_matrix[server.index()] = false;
            for chatroom in self.store.purge_origin_participants(*server) {
                self.publish_snapshot(&chatroom);
            }
        }

        if !delta.joined.is_empty() && self.membership.count() > 1 {
            if self.state == ReplicationState::Primary {
                slog::info!(self.logger, "Entering RECONCILING");
            }
            self.state = ReplicationState::Reconciling;
            for server in &delta.joined {
                self.awaiting_matrix[server.index()] = true;
            }
            self.broadcast_matrix();

            for chatroom in self.store.chatroom_names() {
                self.broadcast_participants(&chatroom);
            }
        } else if !delta.left.is_empty() && self.state == ReplicationState::Reconciling {
            // Responsibility for the servers that left moves to someone else. Restart the exchange.
            self.broadcast_matrix();
        }

        // A server that left may have been the only one holding us back.
        self.try_become_primary()
    }

    /// Periodic anti-entropy: while an exchange is going on, make sure peers have seen our latest
    /// row. A PRIMARY server takes part until its row is broadcast and agrees with every peer's.
    pub fn anti_entropy_tick(&mut self) {
        if self.state == ReplicationState::Primary && !self.exchange_active {
            return;
        }

        if self.row_changed_since_broadcast() {
            self.broadcast_matrix();
        } else if self.state == ReplicationState::Primary
            && anti_entropy::primary_condition_holds(&self.matrix, &self.membership, self.me)
        {
            self.exchange_active = false;
        }
    }

    // ----- state transitions -----

    fn try_become_primary(&mut self) -> Result<(), EngineError> {
        if self.state != ReplicationState::Reconciling
            || self.awaiting_matrix.iter().any(|awaiting| *awaiting)
            || !anti_entropy::primary_condition_holds(&self.matrix, &self.membership, self.me)
        {
            return Ok(());
        }

        slog::info!(self.logger, "Matrix rows agree. Entering PRIMARY");
        self.state = ReplicationState::Primary;
        self.apply_unprocessed()?;

        if self.row_changed_since_broadcast() {
            self.broadcast_matrix();
        }

        for pending in self.pending.take_all() {
            self.handle_client_request(pending.sender, pending.request)?;
        }

        Ok(())
    }

    // ----- applying events -----

    /// Apply every logged event newer than what was already applied, in merge order.
    fn apply_unprocessed(&mut self) -> Result<(), EngineError> {
        let mut streams = Vec::with_capacity(NUM_SERVERS);
        for origin in ServerId::all() {
            streams.push(self.update_log.scan_newer_than(origin, self.processed[origin.index()])?);
        }

        for event in merge_order(streams) {
            self.apply_event(&event, true)?;
        }

        Ok(())
    }

    fn apply_event(&mut self, event: &LogEvent, publish: bool) -> Result<(), EngineError> {
        let chatroom = event.chatroom();
        let changed = match &event.record.kind {
            EventKind::Append { username, text } => {
                let message = Message {
                    lts: event.lts(),
                    username: username.clone(),
                    text: text.clone(),
                    like_count: 0,
                };
                self.store.append_message(chatroom, message)?;
                true
            }
            EventKind::Like { username, target } => {
                self.store.apply_like(chatroom, *target, username) == LikeOutcome::Applied
            }
            EventKind::Unlike { username, target } => {
                self.store.apply_unlike(chatroom, *target, username) == LikeOutcome::Applied
            }
        };

        let processed = &mut self.processed[event.origin.index()];
        if event.counter() > *processed {
            *processed = event.counter();
        }

        if publish && changed {
            self.publish_snapshot(chatroom);
        }

        Ok(())
    }

    fn resend(&mut self, range: ResendRange) -> Result<(), EngineError> {
        slog::info!(
            self.logger,
            "Resending events of {:?} in ({}, {}]",
            range.origin,
            range.after,
            range.through
        );

        let mut after = range.after;
        loop {
            let batch = self
                .update_log
                .read_batch(range.origin, after, self.resend_batch_size)?;
            if batch.is_empty() {
                return Ok(());
            }

            for event in batch {
                if event.counter() > range.through {
                    return Ok(());
                }
                after = event.counter();
                let message = PeerMessage::ServerUpdate {
                    sender: self.me,
                    event,
                };
                self.send(&Destination::ServerGroup, message.encode());
            }
        }
    }

    // ----- outbound -----

    fn row_changed_since_broadcast(&self) -> bool {
        self.last_broadcast_row.as_ref() != Some(self.matrix.row(self.me))
    }

    fn broadcast_matrix(&mut self) {
        self.last_broadcast_row = Some(*self.matrix.row(self.me));
        let message = PeerMessage::AntiEntropy {
            sender: self.me,
            matrix: self.matrix.clone(),
        };
        self.send(&Destination::ServerGroup, message.encode());
    }

    fn broadcast_participants(&mut self, chatroom: &str) {
        let participants = self.store.participants_mut(chatroom).clone();
        let message = PeerMessage::ParticipantUpdate {
            sender: self.me,
            chatroom: chatroom.to_string(),
            participants,
        };
        self.send(&Destination::ServerGroup, message.encode());
    }

    fn publish_snapshot(&mut self, chatroom: &str) {
        let ChatroomSnapshot {
            participants,
            messages,
            ..
        } = self.store.snapshot_for_broadcast(chatroom);
        let response = ClientResponse::ClientUpdate {
            participants,
            messages,
        };
        let destination = Destination::ChatroomClients {
            server: self.me,
            chatroom: chatroom.to_string(),
        };
        self.send(&destination, response.encode());
    }

    fn send(&mut self, destination: &Destination, message: Bytes) {
        if let Err(e) = self.transport.send(destination, message) {
            slog::warn!(self.logger, "Failed to send to {:?}: {}", destination, e);
        }
    }
}
