use bytes::Bytes;
use chat_replica::{
    ClientGroup, ClientRequest, ClientResponse, Destination, EngineConfig, EventKind, FileArchive, FileLog,
    InMemoryArchive, InMemoryLog, LamportCounter, LamportMatrix, LogEvent, LogRecord, Lts, MembershipCause, Message,
    MulticastRecorder, ParticipantSet, PeerMessage, ReplicationEngine, ReplicationState, ServerId,
    ServerMembershipChange, NUM_SERVERS,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

type Engine = ReplicationEngine<InMemoryLog<LogRecord>, InMemoryArchive, MulticastRecorder>;
type FileEngine = ReplicationEngine<FileLog<LogRecord>, FileArchive, MulticastRecorder>;

fn id(v: u32) -> ServerId {
    ServerId::new(v).unwrap()
}

fn lc(v: u32) -> LamportCounter {
    LamportCounter::new(v)
}

fn logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn open_engine(server: u32) -> Engine {
    Engine::open(
        EngineConfig {
            logger: logger(),
            server_id: id(server),
            resend_batch_size: 4,
        },
        |_| Ok(InMemoryLog::new()),
        InMemoryArchive::new(),
        MulticastRecorder::new(),
    )
    .unwrap()
}

fn open_file_engine(directory: &Path, server: u32, recreate: bool) -> FileEngine {
    FileEngine::open(
        EngineConfig {
            logger: logger(),
            server_id: id(server),
            resend_batch_size: 8,
        },
        |origin| FileLog::open(directory.join(format!("{}_server{}.log", server, origin)), recreate),
        FileArchive::new(directory.to_path_buf(), id(server)),
        MulticastRecorder::new(),
    )
    .unwrap()
}

fn append_request(username: &str, chatroom: &str, text: &str) -> ClientRequest {
    ClientRequest::Append {
        username: username.to_string(),
        chatroom: chatroom.to_string(),
        text: text.to_string(),
    }
}

fn server_update(sender: u32, counter: u32, chatroom: &str, text: &str) -> Bytes {
    let event = LogEvent::new(
        id(sender),
        lc(counter),
        chatroom.to_string(),
        EventKind::Append {
            username: "mallory".to_string(),
            text: text.to_string(),
        },
    );
    PeerMessage::ServerUpdate {
        sender: id(sender),
        event,
    }
    .encode()
}

fn assert_monotonic(server: ServerId, before: &LamportMatrix, after: &LamportMatrix) {
    for (row_before, row_after) in before.cells().iter().zip(after.cells().iter()) {
        for (cell_before, cell_after) in row_before.iter().zip(row_after.iter()) {
            assert!(
                cell_after >= cell_before,
                "matrix of {:?} went backwards: {:?} -> {:?}",
                server,
                before,
                after
            );
        }
    }
}

/// Cluster runs engines against each other with a single global delivery order, the way an agreed
/// order multicast would. Broadcasts only reach the sender's current network component.
struct Cluster {
    engines: BTreeMap<ServerId, Engine>,
    components: BTreeMap<ServerId, Vec<ServerId>>,
    in_flight: VecDeque<(ServerId, Bytes)>,
    // Every peer message delivered so far, in delivery order.
    delivered: Vec<PeerMessage>,
    client_outbox: Vec<(Destination, ClientResponse)>,
}

impl Cluster {
    fn new(servers: &[u32]) -> Self {
        let mut engines = BTreeMap::new();
        let mut components = BTreeMap::new();
        for server in servers {
            engines.insert(id(*server), open_engine(*server));
            components.insert(id(*server), vec![id(*server)]);
        }

        Cluster {
            engines,
            components,
            in_flight: VecDeque::new(),
            delivered: Vec::new(),
            client_outbox: Vec::new(),
        }
    }

    fn engine(&self, server: u32) -> &Engine {
        self.engines.get(&id(server)).unwrap()
    }

    fn engine_mut(&mut self, server: u32) -> &mut Engine {
        self.engines.get_mut(&id(server)).unwrap()
    }

    fn request(&mut self, server: u32, client: &str, request: ClientRequest) {
        self.engine_mut(server)
            .handle_client_request(ClientGroup::new(client), request)
            .unwrap();
        self.collect();
    }

    fn append(&mut self, server: u32, username: &str, chatroom: &str, text: &str) {
        let request = append_request(username, chatroom, text);
        self.request(server, &format!("{}-client", username), request);
    }

    /// Replace the network layout and tell every server who it can reach. Messages sent before
    /// the change are delivered under the old layout.
    fn partition(&mut self, groups: &[&[u32]]) {
        self.deliver_all();

        for group in groups {
            let members: Vec<ServerId> = group.iter().map(|v| id(*v)).collect();
            for member in &members {
                self.components.insert(*member, members.clone());
            }
        }

        let layout: Vec<(ServerId, Vec<ServerId>)> = self.components.iter().map(|(s, m)| (*s, m.clone())).collect();
        for (server, members) in layout {
            let engine = self.engines.get_mut(&server).unwrap();
            engine
                .handle_server_membership(ServerMembershipChange {
                    cause: MembershipCause::Network,
                    members,
                })
                .unwrap();
        }
        self.collect();
    }

    fn collect(&mut self) {
        for (server, engine) in self.engines.iter_mut() {
            for (destination, message) in engine.transport_mut().take() {
                match destination {
                    Destination::ServerGroup => self.in_flight.push_back((*server, message)),
                    destination => self
                        .client_outbox
                        .push((destination, ClientResponse::decode(message).unwrap())),
                }
            }
        }
    }

    fn deliver_all(&mut self) {
        let mut steps = 0;
        while let Some((sender, message)) = self.in_flight.pop_front() {
            steps += 1;
            assert!(steps < 100_000, "peer traffic never settles");

            self.delivered.push(PeerMessage::decode(message.clone()).unwrap());
            let receivers = self.components.get(&sender).cloned().unwrap_or_default();
            for receiver in receivers {
                let engine = self.engines.get_mut(&receiver).unwrap();
                let before = engine.matrix().clone();
                engine.handle_peer_message(message.clone()).unwrap();
                assert_monotonic(receiver, &before, engine.matrix());
            }
            self.collect();
        }
    }

    /// Deliver everything and run anti-entropy ticks until nobody has anything left to say.
    fn settle(&mut self) {
        for _ in 0..50 {
            self.deliver_all();
            for engine in self.engines.values_mut() {
                engine.anti_entropy_tick();
            }
            self.collect();
            if self.in_flight.is_empty() {
                return;
            }
        }
        panic!("cluster did not settle");
    }

    fn messages(&self, server: u32, chatroom: &str) -> Vec<Message> {
        self.engine(server)
            .chatrooms()
            .get(chatroom)
            .map(|c| c.messages())
            .unwrap_or_default()
    }

    fn texts(&self, server: u32, chatroom: &str) -> Vec<String> {
        self.messages(server, chatroom).into_iter().map(|m| m.text).collect()
    }
}

#[test]
fn append_while_primary() {
    let mut cluster = Cluster::new(&[1]);
    cluster.append(1, "alice", "general", "hi");

    let engine = cluster.engine(1);
    let logged = engine.logged_events(id(1)).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].record.to_string(), "1~general~a~alice~hi");
    assert_eq!(engine.matrix().get(id(1), id(1)), lc(1));
    assert_eq!(
        cluster.messages(1, "general"),
        vec![Message {
            lts: Lts::new(id(1), lc(1)),
            username: "alice".to_string(),
            text: "hi".to_string(),
            like_count: 0,
        }]
    );

    // Replicated to the server group and published to the room.
    assert_eq!(cluster.in_flight.len(), 1);
    let (_, message) = cluster.in_flight[0].clone();
    match PeerMessage::decode(message).unwrap() {
        PeerMessage::ServerUpdate { sender, event } => {
            assert_eq!(sender, id(1));
            assert_eq!(event, logged[0]);
        }
        other => panic!("Expected a server update, got {:?}", other),
    }
    assert_eq!(cluster.client_outbox.len(), 1);
    assert_eq!(
        cluster.client_outbox[0].0,
        Destination::ChatroomClients {
            server: id(1),
            chatroom: "general".to_string(),
        }
    );
}

#[test]
fn duplicate_server_update_is_discarded() {
    let mut cluster = Cluster::new(&[1, 2]);
    cluster.partition(&[&[1, 2]]);
    cluster.settle();

    cluster.append(1, "alice", "general", "hi");
    let (_, update) = cluster.in_flight[0].clone();
    cluster.settle();
    let matrix_before = cluster.engine(2).matrix().clone();

    cluster.engine_mut(2).handle_peer_message(update).unwrap();

    assert_eq!(cluster.engine(2).logged_events(id(1)).unwrap().len(), 1);
    assert_eq!(cluster.texts(2, "general"), vec!["hi"]);
    assert_eq!(cluster.engine(2).matrix(), &matrix_before);
}

#[test]
fn likes_replicate_as_sets() {
    let mut cluster = Cluster::new(&[1, 2]);
    cluster.partition(&[&[1, 2]]);
    cluster.settle();

    cluster.append(1, "alice", "general", "hi");
    cluster.settle();
    let target = Lts::new(id(1), lc(1));

    let like = ClientRequest::Like {
        username: "bob".to_string(),
        chatroom: "general".to_string(),
        target,
    };
    cluster.request(2, "bob-client", like.clone());
    cluster.request(2, "bob-client", like);
    cluster.settle();

    for server in [1, 2] {
        assert_eq!(cluster.messages(server, "general")[0].like_count, 1);
    }

    cluster.request(
        2,
        "bob-client",
        ClientRequest::Unlike {
            username: "bob".to_string(),
            chatroom: "general".to_string(),
            target,
        },
    );
    cluster.settle();

    for server in [1, 2] {
        assert_eq!(cluster.messages(server, "general")[0].like_count, 0);
    }
    // Every like and unlike is logged, even the one that changed nothing.
    assert_eq!(cluster.engine(1).logged_events(id(2)).unwrap().len(), 3);
}

#[test]
fn like_of_unknown_message_changes_nothing() {
    let mut cluster = Cluster::new(&[1]);
    cluster.append(1, "alice", "general", "hi");
    cluster.request(
        1,
        "bob-client",
        ClientRequest::Like {
            username: "bob".to_string(),
            chatroom: "general".to_string(),
            target: Lts::new(id(4), lc(40)),
        },
    );

    assert_eq!(cluster.messages(1, "general")[0].like_count, 0);
    assert_eq!(cluster.engine(1).logged_events(id(1)).unwrap().len(), 2);
}

#[test]
fn joining_server_receives_history_in_lamport_order() {
    let mut cluster = Cluster::new(&[1, 2, 3]);
    cluster.partition(&[&[1, 3], &[2]]);
    cluster.settle();

    cluster.append(1, "alice", "general", "a1");
    cluster.settle();
    cluster.append(1, "alice", "general", "a2");
    cluster.settle();
    cluster.append(3, "carol", "general", "c1");
    cluster.settle();
    cluster.append(1, "alice", "general", "a3");
    cluster.settle();

    cluster.partition(&[&[1, 2, 3]]);
    for server in [1, 2, 3] {
        assert_eq!(cluster.engine(server).state(), ReplicationState::Reconciling);
    }

    cluster.settle();
    for server in [1, 2, 3] {
        assert_eq!(cluster.engine(server).state(), ReplicationState::Primary);
    }

    let lts: Vec<Lts> = cluster.messages(2, "general").iter().map(|m| m.lts).collect();
    assert_eq!(
        lts,
        vec![
            Lts::new(id(1), lc(1)),
            Lts::new(id(1), lc(2)),
            Lts::new(id(3), lc(3)),
            Lts::new(id(1), lc(4)),
        ]
    );
    assert_eq!(cluster.messages(2, "general"), cluster.messages(1, "general"));
    assert_eq!(cluster.messages(3, "general"), cluster.messages(1, "general"));

    let row = *cluster.engine(1).matrix().row(id(1));
    for server in [1, 2, 3] {
        for observer in [1, 2, 3] {
            assert_eq!(cluster.engine(server).matrix().row(id(observer)), &row);
        }
    }
}

#[test]
fn best_informed_server_resends_for_absent_origin() {
    let mut cluster = Cluster::new(&[1, 3, 4]);
    cluster.partition(&[&[1, 3, 4]]);
    cluster.settle();

    for i in 1..=7 {
        cluster.append(4, "dave", "general", &format!("d{}", i));
        cluster.settle();
    }

    cluster.partition(&[&[1], &[3, 4]]);
    cluster.settle();
    for i in 8..=10 {
        cluster.append(4, "dave", "general", &format!("d{}", i));
        cluster.settle();
    }
    assert_eq!(cluster.engine(1).matrix().get(id(1), id(4)), lc(7));
    assert_eq!(cluster.engine(3).matrix().get(id(3), id(4)), lc(10));

    let mark = cluster.delivered.len();
    cluster.partition(&[&[1, 3], &[4]]);
    cluster.settle();

    let resent: Vec<(ServerId, LamportCounter)> = cluster.delivered[mark..]
        .iter()
        .filter_map(|message| match message {
            PeerMessage::ServerUpdate { sender, event } if event.origin == id(4) => Some((*sender, event.counter())),
            _ => None,
        })
        .collect();

    assert!(resent.iter().all(|(sender, _)| *sender == id(3)), "{:?}", resent);
    let counters: Vec<LamportCounter> = resent.iter().map(|(_, counter)| *counter).collect();
    assert_eq!(counters[..3], [lc(8), lc(9), lc(10)]);
    assert_eq!(
        counters.into_iter().collect::<BTreeSet<_>>(),
        BTreeSet::from([lc(8), lc(9), lc(10)])
    );

    assert_eq!(cluster.engine(1).state(), ReplicationState::Primary);
    assert_eq!(cluster.engine(1).logged_events(id(4)).unwrap().len(), 10);
    assert_eq!(cluster.texts(1, "general"), cluster.texts(3, "general"));
    assert_eq!(cluster.texts(1, "general").len(), 10);
}

#[test]
fn mutations_queue_while_reconciling() {
    let mut cluster = Cluster::new(&[1, 2]);
    cluster.partition(&[&[1, 2]]);
    cluster.settle();
    cluster.append(1, "alice", "general", "before");
    cluster.settle();

    cluster.partition(&[&[1], &[2]]);
    cluster.settle();
    cluster.append(1, "alice", "general", "while apart");
    cluster.settle();

    cluster.partition(&[&[1, 2]]);
    assert_eq!(cluster.engine(2).state(), ReplicationState::Reconciling);
    cluster.append(2, "bob", "general", "queued");
    assert_eq!(cluster.engine(2).status().pending_requests, 1);
    assert!(cluster.engine(2).logged_events(id(2)).unwrap().is_empty());

    cluster.settle();

    assert_eq!(cluster.engine(2).state(), ReplicationState::Primary);
    assert_eq!(cluster.engine(2).status().pending_requests, 0);
    assert_eq!(cluster.engine(2).logged_events(id(2)).unwrap().len(), 1);
    for server in [1, 2] {
        assert_eq!(cluster.texts(server, "general"), vec!["before", "while apart", "queued"]);
    }
}

#[test]
fn partitions_converge_after_heal() {
    let mut cluster = Cluster::new(&[1, 2, 3, 4, 5]);
    cluster.partition(&[&[1, 2], &[3, 4, 5]]);
    cluster.settle();

    for round in 0..4 {
        cluster.append(1 + round % 2, "left-user", "left", &format!("l{}", round));
        cluster.settle();
        cluster.append(3 + round % 3, "right-user", "right", &format!("r{}", round));
        cluster.settle();
    }
    let first_right = cluster.messages(4, "right")[0].lts;
    cluster.request(
        4,
        "right-user-client",
        ClientRequest::Like {
            username: "right-user".to_string(),
            chatroom: "right".to_string(),
            target: first_right,
        },
    );
    cluster.settle();

    cluster.partition(&[&[1, 2, 3, 4, 5]]);
    cluster.settle();

    let row = *cluster.engine(1).matrix().row(id(1));
    for server in 1..=5 {
        let engine = cluster.engine(server);
        assert_eq!(engine.state(), ReplicationState::Primary);
        assert_eq!(engine.status().present, [true; NUM_SERVERS]);
        for observer in 1..=5 {
            assert_eq!(engine.matrix().row(id(observer)), &row, "server {} row {}", server, observer);
        }
        for origin in 1..=5 {
            assert_eq!(
                engine.logged_events(id(origin)).unwrap(),
                cluster.engine(1).logged_events(id(origin)).unwrap()
            );
        }
        assert_eq!(cluster.messages(server, "left"), cluster.messages(1, "left"));
        assert_eq!(cluster.messages(server, "right"), cluster.messages(1, "right"));
    }
    assert_eq!(cluster.texts(5, "left"), vec!["l0", "l1", "l2", "l3"]);
    assert_eq!(cluster.messages(2, "right")[0].like_count, 1);
}

#[test]
fn participants_follow_joins_and_partitions() {
    let mut cluster = Cluster::new(&[1, 2]);
    cluster.partition(&[&[1, 2]]);
    cluster.settle();

    cluster.request(
        1,
        "alice-client",
        ClientRequest::Join {
            username: "alice".to_string(),
            chatroom: "general".to_string(),
        },
    );
    cluster.settle();

    let via_1 = |cluster: &Cluster| {
        cluster
            .engine(2)
            .chatrooms()
            .get("general")
            .map(|c| c.participants().via(id(1)).clone())
            .unwrap_or_default()
    };
    assert!(via_1(&cluster).contains("alice"));
    let published_at_2 = cluster.client_outbox.iter().any(|(destination, response)| {
        matches!(destination, Destination::ChatroomClients { server, .. } if *server == id(2))
            && matches!(response, ClientResponse::ClientUpdate { participants, .. } if participants.contains("alice"))
    });
    assert!(published_at_2);

    cluster.partition(&[&[1], &[2]]);
    cluster.settle();
    assert!(via_1(&cluster).is_empty());

    cluster.partition(&[&[1, 2]]);
    cluster.settle();
    assert!(via_1(&cluster).contains("alice"));

    cluster.engine_mut(1).handle_client_left(&ClientGroup::new("alice-client"));
    cluster.collect();
    cluster.settle();
    assert!(via_1(&cluster).is_empty());
}

#[test]
fn membership_status_lists_present_servers() {
    let mut cluster = Cluster::new(&[1, 2, 3]);
    cluster.partition(&[&[1, 3], &[2]]);
    cluster.settle();

    cluster.request(1, "alice-client", ClientRequest::MembershipStatus);
    let (destination, response) = cluster.client_outbox.pop().unwrap();
    assert_eq!(destination, Destination::Client(ClientGroup::new("alice-client")));
    assert_eq!(
        response,
        ClientResponse::MembershipStatusResponse {
            present: [true, false, true, false, false],
        }
    );
}

#[test]
fn restart_rebuilds_chatrooms_from_the_update_log() {
    let dir = tempfile::tempdir().unwrap();
    let open = |recreate: bool| open_file_engine(dir.path(), 1, recreate);

    let history = |engine: &mut FileEngine| {
        engine
            .handle_client_request(
                ClientGroup::new("reader"),
                ClientRequest::History {
                    chatroom: "general".to_string(),
                },
            )
            .unwrap();
        let response = engine
            .transport_mut()
            .take()
            .into_iter()
            .find(|(destination, _)| matches!(destination, Destination::Client(_)))
            .map(|(_, message)| ClientResponse::decode(message).unwrap());
        match response {
            Some(ClientResponse::HistoryResponse { messages }) => messages,
            other => panic!("Expected history, got {:?}", other),
        }
    };

    let mut engine = open(true);
    for i in 0..30 {
        engine
            .handle_client_request(
                ClientGroup::new("alice-client"),
                append_request("alice", "general", &format!("m{}", i)),
            )
            .unwrap();
    }
    let resident_before = engine.chatrooms().get("general").unwrap().messages();
    assert_eq!(resident_before.len(), 25);
    assert_eq!(resident_before[0].text, "m5");
    assert_eq!(history(&mut engine).len(), 30);
    drop(engine);

    let mut engine = open(false);
    assert_eq!(engine.matrix().get(id(1), id(1)), lc(30));
    assert_eq!(engine.chatrooms().get("general").unwrap().messages(), resident_before);

    let texts: Vec<String> = history(&mut engine).into_iter().map(|m| m.text).collect();
    let expected: Vec<String> = (0..30).map(|i| format!("m{}", i)).collect();
    assert_eq!(texts, expected);

    // The clock picks up where the log left off.
    engine
        .handle_client_request(
            ClientGroup::new("alice-client"),
            append_request("alice", "general", "after restart"),
        )
        .unwrap();
    let logged = engine.logged_events(id(1)).unwrap();
    assert_eq!(logged.last().unwrap().counter(), lc(31));
}

#[test]
fn path_like_chatroom_names_cannot_break_history_files() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir(&data).unwrap();
    let mut engine = open_file_engine(&data, 1, true);

    // Clients are refused outright.
    for i in 0..=25 {
        engine
            .handle_client_request(
                ClientGroup::new("mallory-client"),
                append_request("mallory", "a/b", &format!("m{}", i)),
            )
            .unwrap();
    }
    assert!(engine.logged_events(id(1)).unwrap().is_empty());
    assert!(engine.chatrooms().get("a/b").is_none());

    // Peers and the log are trusted, so those names must still fit in one history file.
    for counter in 1..=26 {
        engine
            .handle_peer_message(server_update(2, counter, "../a/b", &format!("p{}", counter)))
            .unwrap();
    }
    let history = engine.chatrooms().history("../a/b").unwrap();
    assert_eq!(history.len(), 26);
    assert_eq!(history[0].text, "p1");
    assert_eq!(engine.chatrooms().get("../a/b").unwrap().messages().len(), 25);

    let outside: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(outside, vec![std::ffi::OsString::from("data")]);
    drop(engine);

    // And the same log replays cleanly after a restart.
    let engine = open_file_engine(&data, 1, false);
    assert_eq!(engine.chatrooms().history("../a/b").unwrap().len(), 26);
}

#[test]
fn exhausted_counter_drops_local_updates() {
    let mut cluster = Cluster::new(&[1]);
    cluster
        .engine_mut(1)
        .handle_peer_message(server_update(2, u32::MAX, "general", "last word"))
        .unwrap();
    cluster.collect();
    assert_eq!(cluster.texts(1, "general"), vec!["last word"]);

    cluster.append(1, "alice", "general", "one more");

    let engine = cluster.engine(1);
    assert!(engine.logged_events(id(1)).unwrap().is_empty());
    assert_eq!(engine.matrix().get(id(1), id(1)), lc(0));
    assert_eq!(engine.matrix().get(id(1), id(2)), lc(u32::MAX));
    assert_eq!(cluster.texts(1, "general"), vec!["last word"]);
    assert!(cluster.in_flight.is_empty());
}

#[test]
fn participant_updates_only_speak_for_sender_and_absent_servers() {
    let mut cluster = Cluster::new(&[1, 2, 3]);
    cluster.partition(&[&[1, 2, 3]]);
    cluster.settle();
    cluster.request(
        1,
        "alice-client",
        ClientRequest::Join {
            username: "alice".to_string(),
            chatroom: "general".to_string(),
        },
    );
    cluster.request(
        3,
        "carol-client",
        ClientRequest::Join {
            username: "carol".to_string(),
            chatroom: "general".to_string(),
        },
    );
    cluster.settle();

    let mut claimed = ParticipantSet::new();
    claimed.insert(id(1), "impostor");
    claimed.insert(id(2), "bob");
    claimed.insert(id(3), "mallory");
    let update = PeerMessage::ParticipantUpdate {
        sender: id(2),
        chatroom: "general".to_string(),
        participants: claimed,
    }
    .encode();

    let via = |cluster: &Cluster, server: u32| {
        cluster
            .engine(1)
            .chatrooms()
            .get("general")
            .unwrap()
            .participants()
            .via(id(server))
            .clone()
    };

    cluster.engine_mut(1).handle_peer_message(update.clone()).unwrap();
    assert_eq!(via(&cluster, 1), BTreeSet::from(["alice".to_string()]));
    assert_eq!(via(&cluster, 2), BTreeSet::from(["bob".to_string()]));
    assert_eq!(via(&cluster, 3), BTreeSet::from(["carol".to_string()]));

    // Once server 3 is gone, server 2's view of it is the best there is.
    cluster.partition(&[&[1, 2], &[3]]);
    cluster.settle();
    assert!(via(&cluster, 3).is_empty());

    cluster.engine_mut(1).handle_peer_message(update).unwrap();
    assert_eq!(via(&cluster, 1), BTreeSet::from(["alice".to_string()]));
    assert_eq!(via(&cluster, 3), BTreeSet::from(["mallory".to_string()]));
}
