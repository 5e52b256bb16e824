use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hirebot_backend::{
    client::{
        ClientFrame, ConnectError, Connection, ConnectionState, Connector, EventMultiplexer,
        Handlers, MultiplexerConfig, SeenIds,
    },
    models::event::EventKind,
};
use mockall::mock;
use serde_json::json;
use tokio::sync::mpsc;

/// The far end of one fake socket.
struct ServerSide {
    to_client: mpsc::UnboundedSender<ClientFrame>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl ServerSide {
    fn push(&self, value: serde_json::Value) {
        self.to_client
            .send(ClientFrame::Text(value.to_string()))
            .unwrap();
    }
}

struct FakeConnector {
    connects: Arc<AtomicUsize>,
    servers: mpsc::UnboundedSender<ServerSide>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Connection, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        self.servers
            .send(ServerSide {
                to_client,
                from_client,
            })
            .map_err(|_| ConnectError::Failed("test server gone".into()))?;
        Ok(Connection { outgoing, incoming })
    }
}

mock! {
    pub Server {}
    #[async_trait]
    impl Connector for Server {
        async fn connect(&self) -> Result<Connection, ConnectError>;
    }
}

fn fast() -> MultiplexerConfig {
    MultiplexerConfig {
        reconnect_delay: Duration::from_millis(20),
        heartbeat_interval: Duration::from_secs(3600),
    }
}

fn fake() -> (
    EventMultiplexer,
    Arc<AtomicUsize>,
    mpsc::UnboundedReceiver<ServerSide>,
) {
    let connects = Arc::new(AtomicUsize::new(0));
    let (servers, accepted) = mpsc::unbounded_channel();
    let mux = EventMultiplexer::new(
        FakeConnector {
            connects: connects.clone(),
            servers,
        },
        fast(),
    );
    (mux, connects, accepted)
}

async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn next_server(accepted: &mut mpsc::UnboundedReceiver<ServerSide>) -> ServerSide {
    tokio::time::timeout(Duration::from_secs(2), accepted.recv())
        .await
        .expect("connect in time")
        .expect("connector alive")
}

fn counting(kind: EventKind, counter: &Arc<AtomicUsize>) -> Handlers {
    let counter = counter.clone();
    Handlers::new().on(kind, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

fn new_message() -> serde_json::Value {
    json!({
        "type": "NEW_MESSAGE",
        "payload": { "candidateId": "5b7f3a55-6b5e-4c7a-9a43-0d0c7d1f2e11" }
    })
}

#[tokio::test]
async fn one_socket_feeds_every_subscriber_once() {
    let (mux, connects, mut accepted) = fake();
    let counters: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let subs: Vec<_> = counters
        .iter()
        .map(|c| mux.subscribe(counting(EventKind::NewMessage, c)))
        .collect();

    let server = next_server(&mut accepted).await;
    assert_eq!(mux.subscriber_count(), 3);
    server.push(new_message());
    server.push(json!({ "type": "STATUS_CHANGE", "payload": {} }));

    eventually(|| counters.iter().all(|c| c.load(Ordering::SeqCst) == 1)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    drop(subs);
}

#[tokio::test]
async fn socket_closes_only_after_the_last_subscriber_leaves() {
    let (mux, _connects, mut accepted) = fake();
    let counter = Arc::new(AtomicUsize::new(0));
    let a = mux.subscribe(counting(EventKind::NewMessage, &counter));
    let b = mux.subscribe(counting(EventKind::NewMessage, &counter));
    let c = mux.subscribe(counting(EventKind::NewMessage, &counter));
    let mut server = next_server(&mut accepted).await;
    eventually(|| mux.state() == ConnectionState::Open).await;

    drop(a);
    drop(b);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.from_client.try_recv().is_err());
    assert_eq!(mux.state(), ConnectionState::Open);

    server.push(new_message());
    eventually(|| counter.load(Ordering::SeqCst) == 1).await;

    drop(c);
    let frame = tokio::time::timeout(Duration::from_secs(2), server.from_client.recv())
        .await
        .expect("close in time");
    match frame {
        Some(ClientFrame::Close { code, .. }) => assert_eq!(code, 1000),
        other => panic!("expected a normal close, got {:?}", other),
    }
    eventually(|| mux.state() == ConnectionState::Idle).await;
}

#[tokio::test]
async fn abnormal_drop_reconnects_while_subscribed() {
    let (mux, connects, mut accepted) = fake();
    let counter = Arc::new(AtomicUsize::new(0));
    let _sub = mux.subscribe(counting(EventKind::CandidateUpdate, &counter));

    let first = next_server(&mut accepted).await;
    drop(first);

    let second = next_server(&mut accepted).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2);
    second.push(json!({ "type": "CANDIDATE_UPDATE", "payload": { "id": "x" } }));
    eventually(|| counter.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn policy_close_is_terminal() {
    let (mux, connects, mut accepted) = fake();
    let _sub = mux.subscribe(Handlers::new());
    let server = next_server(&mut accepted).await;

    server
        .to_client
        .send(ClientFrame::Close {
            code: 1008,
            reason: "Unauthorized".into(),
        })
        .unwrap();
    eventually(|| mux.state() == ConnectionState::Rejected).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_handshake_is_not_retried() {
    let mut server = MockServer::new();
    server
        .expect_connect()
        .times(1)
        .returning(|| Err(ConnectError::Rejected("HTTP 401".into())));
    let mux = EventMultiplexer::new(server, fast());

    let _sub = mux.subscribe(Handlers::new());
    eventually(|| mux.state() == ConnectionState::Rejected).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mux.state(), ConnectionState::Rejected);
}

#[tokio::test]
async fn failed_connects_are_retried() {
    let mut server = MockServer::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    server.expect_connect().returning(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(ConnectError::Failed("connection refused".into()))
    });
    let mux = EventMultiplexer::new(server, fast());

    let sub = mux.subscribe(Handlers::new());
    eventually(|| attempts.load(Ordering::SeqCst) >= 3).await;
    drop(sub);
    eventually(|| mux.state() == ConnectionState::Idle).await;
}

#[tokio::test]
async fn replaced_handlers_take_effect_on_the_next_frame() {
    let (mux, _connects, mut accepted) = fake();
    let old = Arc::new(AtomicUsize::new(0));
    let new = Arc::new(AtomicUsize::new(0));
    let sub = mux.subscribe(counting(EventKind::NewMessage, &old));
    let server = next_server(&mut accepted).await;

    server.push(new_message());
    eventually(|| old.load(Ordering::SeqCst) == 1).await;

    sub.replace_handlers(counting(EventKind::NewMessage, &new));
    server.push(new_message());
    eventually(|| new.load(Ordering::SeqCst) == 1).await;
    assert_eq!(old.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn consumers_drop_repeated_message_ids() {
    let (mux, _connects, mut accepted) = fake();
    let applied = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Mutex::new(SeenIds::new(100)));
    let sink = applied.clone();
    let _sub = mux.subscribe(Handlers::new().on(EventKind::NewMessage, move |payload| {
        let Some(id) = payload["message"]["id"].as_str() else {
            return;
        };
        if seen.lock().unwrap().insert(id.to_string()) {
            sink.lock().unwrap().push(id.to_string());
        }
    }));
    let server = next_server(&mut accepted).await;

    for id in ["m1", "m2", "m1"] {
        server.push(json!({
            "type": "NEW_MESSAGE",
            "payload": { "message": { "id": id } }
        }));
    }
    server.push(json!({ "type": "NEW_MESSAGE", "payload": { "message": { "id": "m3" } } }));

    eventually(|| applied.lock().unwrap().len() == 3).await;
    assert_eq!(*applied.lock().unwrap(), vec!["m1", "m2", "m3"]);
}

#[tokio::test]
async fn resubscribing_after_the_last_leave_opens_a_fresh_socket() {
    let (mux, connects, mut accepted) = fake();
    let first = mux.subscribe(Handlers::new());
    let mut old = next_server(&mut accepted).await;
    eventually(|| mux.state() == ConnectionState::Open).await;

    drop(first);
    let counter = Arc::new(AtomicUsize::new(0));
    let _second = mux.subscribe(counting(EventKind::NewMessage, &counter));

    let frame = tokio::time::timeout(Duration::from_secs(2), old.from_client.recv())
        .await
        .expect("old socket closed in time");
    assert!(matches!(frame, Some(ClientFrame::Close { code: 1000, .. })));

    let fresh = next_server(&mut accepted).await;
    eventually(|| mux.state() == ConnectionState::Open).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mux.state(), ConnectionState::Open);
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    fresh.push(new_message());
    eventually(|| counter.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_leave_and_join_never_strands_a_subscriber() {
    let (mux, _connects, _accepted) = fake();
    for _ in 0..50 {
        let leaving = mux.subscribe(Handlers::new());
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let gate = barrier.clone();
        let dropper = std::thread::spawn(move || {
            gate.wait();
            drop(leaving);
        });
        barrier.wait();
        let staying = mux.subscribe(Handlers::new());
        dropper.join().unwrap();

        assert_eq!(mux.subscriber_count(), 1);
        eventually(|| mux.state() == ConnectionState::Open).await;
        drop(staying);
        eventually(|| mux.state() == ConnectionState::Idle).await;
    }
}
