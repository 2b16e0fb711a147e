use crate::actor::ActorClient;
use crate::replica::ServerId;
use crate::transport::membership::{MembershipCause, ServerMembershipChange};
use crate::transport::multicast::{ClientGroup, Destination, Multicast, TransportError};
use crate::wire::{ClientRequest, ClientResponse};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::mpsc;

enum HubCommand {
    RegisterServer {
        server: ServerId,
        actor: ActorClient,
    },
    RemoveServer {
        server: ServerId,
        cause: MembershipCause,
    },
    ConnectClient {
        group: ClientGroup,
        server: ServerId,
        responses: mpsc::UnboundedSender<Bytes>,
    },
    SubscribeClient {
        group: ClientGroup,
        chatroom: String,
    },
    DisconnectClient {
        group: ClientGroup,
    },
    FromClient {
        group: ClientGroup,
        message: Bytes,
    },
    Deliver {
        destination: Destination,
        message: Bytes,
    },
}

/// LocalHub is an in-process group communication layer for servers running in one process.
///
/// A single task handles every command in the order it was submitted, so all servers see server
/// group messages and membership changes in one agreed order. Server group messages are also
/// delivered back to their sender.
#[derive(Clone)]
pub struct LocalHub {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl LocalHub {
    pub fn spawn(logger: slog::Logger) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            logger,
            servers: BTreeMap::new(),
            clients: HashMap::new(),
        };
        tokio::task::spawn(hub.run(rx));

        LocalHub { commands: tx }
    }

    /// Add `server` to the server group. Every member, the new one included, is notified.
    pub fn register_server(&self, server: ServerId, actor: ActorClient) -> Result<(), TransportError> {
        self.submit(HubCommand::RegisterServer { server, actor })
    }

    pub fn remove_server(&self, server: ServerId, cause: MembershipCause) -> Result<(), TransportError> {
        self.submit(HubCommand::RemoveServer { server, cause })
    }

    /// Connect a new client named `name` to `server`.
    pub fn connect_client(&self, server: ServerId, name: &str) -> Result<LocalClient, TransportError> {
        let group = ClientGroup::new(format!("{}#{}", name, server));
        let (tx, rx) = mpsc::unbounded_channel();
        self.submit(HubCommand::ConnectClient {
            group: group.clone(),
            server,
            responses: tx,
        })?;

        Ok(LocalClient {
            group,
            hub: self.clone(),
            responses: rx,
        })
    }

    fn submit(&self, command: HubCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Disconnected)
    }
}

impl Multicast for LocalHub {
    fn send(&mut self, destination: &Destination, message: Bytes) -> Result<(), TransportError> {
        self.submit(HubCommand::Deliver {
            destination: destination.clone(),
            message,
        })
    }
}

/// A client connected to one server through a `LocalHub`.
pub struct LocalClient {
    group: ClientGroup,
    hub: LocalHub,
    responses: mpsc::UnboundedReceiver<Bytes>,
}

impl LocalClient {
    pub fn group(&self) -> &ClientGroup {
        &self.group
    }

    /// Move to `chatroom`'s client group, then ask the server to join it.
    pub fn join(&self, username: &str, chatroom: &str) -> Result<(), TransportError> {
        self.hub.submit(HubCommand::SubscribeClient {
            group: self.group.clone(),
            chatroom: chatroom.to_string(),
        })?;
        self.request(&ClientRequest::Join {
            username: username.to_string(),
            chatroom: chatroom.to_string(),
        })
    }

    pub fn request(&self, request: &ClientRequest) -> Result<(), TransportError> {
        self.hub.submit(HubCommand::FromClient {
            group: self.group.clone(),
            message: request.encode(),
        })
    }

    /// The next response for this client. None once the hub is gone.
    pub async fn recv(&mut self) -> Option<ClientResponse> {
        while let Some(bytes) = self.responses.recv().await {
            if let Ok(response) = ClientResponse::decode(bytes) {
                return Some(response);
            }
        }
        None
    }

    pub fn disconnect(self) -> Result<(), TransportError> {
        self.hub.submit(HubCommand::DisconnectClient { group: self.group })
    }
}

struct ClientEntry {
    server: ServerId,
    chatroom: Option<String>,
    responses: mpsc::UnboundedSender<Bytes>,
}

struct Hub {
    logger: slog::Logger,
    servers: BTreeMap<ServerId, ActorClient>,
    clients: HashMap<ClientGroup, ClientEntry>,
}

impl Hub {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(command) = commands.recv().await {
            self.handle_command(command).await;
        }
        slog::debug!(self.logger, "Local hub stopped");
    }

    async fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::RegisterServer { server, actor } => {
                self.servers.insert(server, actor);
                self.notify_membership(MembershipCause::Join).await;
            }
            HubCommand::RemoveServer { server, cause } => {
                if self.servers.remove(&server).is_some() {
                    self.notify_membership(cause).await;
                }
            }
            HubCommand::ConnectClient {
                group,
                server,
                responses,
            } => {
                self.clients.insert(
                    group,
                    ClientEntry {
                        server,
                        chatroom: None,
                        responses,
                    },
                );
            }
            HubCommand::SubscribeClient { group, chatroom } => {
                if let Some(entry) = self.clients.get_mut(&group) {
                    entry.chatroom = Some(chatroom);
                }
            }
            HubCommand::DisconnectClient { group } => {
                if let Some(entry) = self.clients.remove(&group) {
                    if let Some(actor) = self.servers.get(&entry.server).cloned() {
                        if actor.client_left(group).await.is_err() {
                            self.server_gone(entry.server).await;
                        }
                    }
                }
            }
            HubCommand::FromClient { group, message } => {
                let server = match self.clients.get(&group) {
                    Some(entry) => entry.server,
                    None => return,
                };
                if let Some(actor) = self.servers.get(&server).cloned() {
                    if actor.client_message(group, message).await.is_err() {
                        self.server_gone(server).await;
                    }
                }
            }
            HubCommand::Deliver { destination, message } => self.deliver(destination, message).await,
        }
    }

    async fn deliver(&mut self, destination: Destination, message: Bytes) {
        match destination {
            Destination::ServerGroup => {
                let servers: Vec<(ServerId, ActorClient)> =
                    self.servers.iter().map(|(id, a)| (*id, a.clone())).collect();
                for (server, actor) in servers {
                    if actor.peer_message(message.clone()).await.is_err() {
                        self.server_gone(server).await;
                    }
                }
            }
            Destination::ChatroomClients { server, chatroom } => {
                for entry in self.clients.values() {
                    if entry.server == server && entry.chatroom.as_deref() == Some(chatroom.as_str()) {
                        let _ = entry.responses.send(message.clone());
                    }
                }
            }
            Destination::Client(group) => {
                if let Some(entry) = self.clients.get(&group) {
                    let _ = entry.responses.send(message);
                }
            }
        }
    }

    // The server's event loop exited. Treat it like a crash.
    async fn server_gone(&mut self, server: ServerId) {
        if self.servers.remove(&server).is_some() {
            slog::warn!(self.logger, "Server {:?} is unreachable. Removing it from the group.", server);
            self.notify_membership(MembershipCause::Disconnect).await;
        }
    }

    async fn notify_membership(&mut self, cause: MembershipCause) {
        let members: Vec<ServerId> = self.servers.keys().copied().collect();
        let actors: Vec<ActorClient> = self.servers.values().cloned().collect();
        for actor in actors {
            let change = ServerMembershipChange {
                cause,
                members: members.clone(),
            };
            // A dead actor is found and removed on the next delivery to it.
            let _ = actor.server_membership(change).await;
        }
    }
}
