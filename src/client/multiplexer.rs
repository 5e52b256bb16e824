use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::connector::{ClientFrame, ConnectError, Connection, Connector};
use crate::models::event::{EventKind, WireFrame};

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Handlers {
    map: HashMap<EventKind, Handler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, kind: EventKind, handler: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.map.insert(kind, Arc::new(handler));
        self
    }

    fn get(&self, kind: EventKind) -> Option<Handler> {
        self.map.get(&kind).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct MultiplexerConfig {
    pub reconnect_delay: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for MultiplexerConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            heartbeat_interval: Duration::from_secs(25),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    /// The server refused this client. No reconnect until every subscriber
    /// has left and a new one arrives.
    Rejected,
}

struct Driver {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Inner {
    subscribers: BTreeMap<u64, Handlers>,
    driver: Option<Driver>,
    generations: u64,
}

impl Inner {
    fn stop_driver(&mut self) -> bool {
        match self.driver.take() {
            Some(driver) => {
                driver.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `state` only while `generation` is still the current driver.
    fn publish(&self, generation: u64, state: ConnectionState) -> bool {
        let inner = self.lock();
        let current = inner.driver.as_ref().map(|d| d.generation) == Some(generation);
        if current {
            self.state.send_replace(state);
        }
        current
    }

    fn dispatch(&self, text: &str) {
        let frame: WireFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "ignoring undecodable realtime frame");
                return;
            }
        };
        let Some(kind) = EventKind::from_wire(&frame.kind) else {
            return;
        };
        let payload = frame.payload.unwrap_or(Value::Null);

        // Handlers run without the lock so they may subscribe or unsubscribe.
        let handlers: Vec<Handler> = self
            .lock()
            .subscribers
            .values()
            .filter_map(|h| h.get(kind))
            .collect();
        for handler in handlers {
            handler(&payload);
        }
    }
}

pub struct EventMultiplexer {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: MultiplexerConfig,
}

impl EventMultiplexer {
    pub fn new(connector: impl Connector, config: MultiplexerConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                next_id: AtomicU64::new(1),
                state,
            }),
            connector: Arc::new(connector),
            config,
        }
    }

    /// Registers `handlers`. Must be called inside a tokio runtime because the
    /// first subscriber starts the connection task.
    pub fn subscribe(&self, handlers: Handlers) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.shared.lock();
        inner.subscribers.insert(id, handlers);

        if inner.driver.is_none() {
            inner.generations += 1;
            let generation = inner.generations;
            let cancel = CancellationToken::new();
            inner.driver = Some(Driver {
                generation,
                cancel: cancel.clone(),
            });
            self.shared.state.send_replace(ConnectionState::Connecting);
            tokio::spawn(run(
                self.shared.clone(),
                self.connector.clone(),
                self.config.clone(),
                generation,
                cancel,
            ));
        }

        Subscription {
            id,
            shared: self.shared.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().subscribers.len()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }
}

impl Drop for EventMultiplexer {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if inner.stop_driver() {
            self.shared.state.send_replace(ConnectionState::Idle);
        }
    }
}

pub struct Subscription {
    id: u64,
    shared: Arc<Shared>,
}

impl Subscription {
    pub fn replace_handlers(&self, handlers: Handlers) {
        if let Some(slot) = self.shared.lock().subscribers.get_mut(&self.id) {
            *slot = handlers;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        inner.subscribers.remove(&self.id);
        // The connection task sends a normal close on its way out.
        if inner.subscribers.is_empty() && inner.stop_driver() {
            self.shared.state.send_replace(ConnectionState::Idle);
        }
    }
}

enum Exit {
    Cancelled,
    Rejected,
    Lost,
}

async fn run(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: MultiplexerConfig,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connector.connect() => result,
        };

        match connected {
            Ok(mut conn) => {
                if !shared.publish(generation, ConnectionState::Open) {
                    let _ = conn.outgoing.send(ClientFrame::Close {
                        code: CLOSE_NORMAL,
                        reason: "no subscribers".to_string(),
                    });
                    return;
                }
                tracing::debug!(generation, "realtime connection open");
                match pump(&shared, &mut conn, &config, &cancel).await {
                    Exit::Cancelled => {
                        let _ = conn.outgoing.send(ClientFrame::Close {
                            code: CLOSE_NORMAL,
                            reason: "no subscribers".to_string(),
                        });
                        return;
                    }
                    Exit::Rejected => {
                        tracing::warn!("realtime connection closed by policy; not reconnecting");
                        shared.publish(generation, ConnectionState::Rejected);
                        return;
                    }
                    Exit::Lost => tracing::info!("realtime connection lost"),
                }
            }
            Err(ConnectError::Rejected(reason)) => {
                tracing::warn!(%reason, "realtime connection rejected; not reconnecting");
                shared.publish(generation, ConnectionState::Rejected);
                return;
            }
            Err(ConnectError::Failed(reason)) => {
                tracing::info!(%reason, "realtime connect failed");
            }
        }

        if !shared.publish(generation, ConnectionState::Reconnecting) {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
        if !shared.publish(generation, ConnectionState::Connecting) {
            return;
        }
    }
}

async fn pump(
    shared: &Shared,
    conn: &mut Connection,
    config: &MultiplexerConfig,
    cancel: &CancellationToken,
) -> Exit {
    let ping = serde_json::to_string(&WireFrame::ping()).unwrap_or_else(|_| r#"{"type":"PING"}"#.to_string());
    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Exit::Cancelled,
            _ = heartbeat.tick() => {
                if conn.outgoing.send(ClientFrame::Text(ping.clone())).is_err() {
                    return Exit::Lost;
                }
            }
            frame = conn.incoming.recv() => match frame {
                Some(ClientFrame::Text(text)) => shared.dispatch(&text),
                Some(ClientFrame::Close { code, .. }) if code == CLOSE_POLICY_VIOLATION => {
                    return Exit::Rejected;
                }
                Some(ClientFrame::Close { .. }) | None => return Exit::Lost,
            },
        }
    }
}
