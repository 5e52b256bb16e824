use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::event::{BroadcastEvent, WireFrame};

pub type ConnectionId = u64;

pub const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(Arc<str>),
    Ping,
    Close { code: u16, reason: String },
}

struct Connection {
    operator_id: Uuid,
    tx: mpsc::UnboundedSender<OutboundFrame>,
    alive: AtomicBool,
}

pub struct BroadcastHub {
    connections: DashMap<ConnectionId, Connection>,
    next_id: AtomicU64,
    heartbeat_interval: Duration,
    heartbeat: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl BroadcastHub {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            heartbeat_interval,
            heartbeat: Mutex::new(None),
        }
    }

    pub fn register(&self, operator_id: Uuid) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundFrame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            Connection {
                operator_id,
                tx,
                alive: AtomicBool::new(true),
            },
        );
        tracing::info!(connection_id = id, %operator_id, total = self.connections.len(), "operator connected");
        (id, rx)
    }

    pub fn unregister(&self, id: ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(&id) {
            tracing::info!(
                connection_id = id,
                operator_id = %conn.operator_id,
                total = self.connections.len(),
                "operator disconnected"
            );
        }
    }

    pub fn mark_alive(&self, id: ConnectionId) {
        if let Some(conn) = self.connections.get(&id) {
            conn.alive.store(true, Ordering::Release);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn send_to(&self, id: ConnectionId, frame: OutboundFrame) -> bool {
        self.connections
            .get(&id)
            .map(|conn| conn.tx.send(frame).is_ok())
            .unwrap_or(false)
    }

    pub fn reply_pong(&self, id: ConnectionId) -> bool {
        match serde_json::to_string(&WireFrame::pong()) {
            Ok(text) => self.send_to(id, OutboundFrame::Text(Arc::from(text))),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode pong frame");
                false
            }
        }
    }

    pub fn broadcast(&self, event: &BroadcastEvent) -> usize {
        let text: Arc<str> = match serde_json::to_string(event) {
            Ok(text) => Arc::from(text),
            Err(err) => {
                tracing::error!(error = %err, kind = ?event.kind(), "failed to encode broadcast event");
                return 0;
            }
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.connections.iter() {
            if entry.tx.send(OutboundFrame::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.unregister(id);
        }

        tracing::debug!(kind = ?event.kind(), delivered, "event broadcast");
        delivered
    }

    /// One heartbeat cycle. Closes connections that missed the previous ping and
    /// pings the rest. Returns the number of connections dropped.
    pub fn heartbeat_tick(&self) -> usize {
        let mut dead = Vec::new();
        for entry in self.connections.iter() {
            let was_alive = entry.alive.swap(false, Ordering::AcqRel);
            if !was_alive || entry.tx.send(OutboundFrame::Ping).is_err() {
                dead.push(*entry.key());
            }
        }

        for id in &dead {
            if let Some((_, conn)) = self.connections.remove(id) {
                let _ = conn.tx.send(OutboundFrame::Close {
                    code: CLOSE_GOING_AWAY,
                    reason: "heartbeat timeout".to_string(),
                });
                tracing::warn!(connection_id = id, "dropping unresponsive operator connection");
            }
        }
        dead.len()
    }

    pub fn start(self: &Arc<Self>) {
        let mut slot = self.heartbeat.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let hub = Arc::downgrade(self);
        let token = cancel.clone();
        let period = self.heartbeat_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(hub) = hub.upgrade() else { break };
                        hub.heartbeat_tick();
                    }
                }
            }
        });
        *slot = Some((cancel, handle));
        tracing::info!(interval_secs = period.as_secs(), "broadcast hub heartbeat started");
    }

    pub fn stop(&self) {
        let running = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((cancel, handle)) = running {
            cancel.cancel();
            handle.abort();
        }

        let ids: Vec<ConnectionId> = self.connections.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, conn)) = self.connections.remove(&id) {
                let _ = conn.tx.send(OutboundFrame::Close {
                    code: CLOSE_GOING_AWAY,
                    reason: "server shutting down".to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::StatusChangePayload;
    use crate::models::candidate::CandidateStatus;

    fn status_event() -> BroadcastEvent {
        BroadcastEvent::StatusChange(StatusChangePayload {
            candidate_id: Uuid::new_v4(),
            status: CandidateStatus::Hired,
        })
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection_once() {
        let hub = BroadcastHub::new(Duration::from_secs(30));
        let (_, mut a) = hub.register(Uuid::new_v4());
        let (_, mut b) = hub.register(Uuid::new_v4());

        assert_eq!(hub.broadcast(&status_event()), 2);

        for rx in [&mut a, &mut b] {
            match rx.try_recv().unwrap() {
                OutboundFrame::Text(text) => assert!(text.contains("\"STATUS_CHANGE\"")),
                other => panic!("unexpected frame {:?}", other),
            }
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn silent_connection_is_dropped_after_one_missed_cycle() {
        let hub = BroadcastHub::new(Duration::from_secs(30));
        let (quiet, mut quiet_rx) = hub.register(Uuid::new_v4());
        let (chatty, mut chatty_rx) = hub.register(Uuid::new_v4());

        assert_eq!(hub.heartbeat_tick(), 0);
        assert_eq!(quiet_rx.try_recv().unwrap(), OutboundFrame::Ping);
        assert_eq!(chatty_rx.try_recv().unwrap(), OutboundFrame::Ping);

        hub.mark_alive(chatty);
        assert_eq!(hub.heartbeat_tick(), 1);
        assert_eq!(hub.connection_count(), 1);
        assert!(matches!(
            quiet_rx.try_recv().unwrap(),
            OutboundFrame::Close { code: CLOSE_GOING_AWAY, .. }
        ));
        assert!(!hub.send_to(quiet, OutboundFrame::Ping));
    }

    #[tokio::test]
    async fn closed_receiver_is_pruned_on_broadcast() {
        let hub = BroadcastHub::new(Duration::from_secs(30));
        let (_, rx) = hub.register(Uuid::new_v4());
        drop(rx);
        assert_eq!(hub.broadcast(&status_event()), 0);
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn stop_closes_connections() {
        let hub = Arc::new(BroadcastHub::new(Duration::from_millis(20)));
        hub.start();
        let (_, mut rx) = hub.register(Uuid::new_v4());
        hub.stop();
        assert_eq!(hub.connection_count(), 0);
        let mut saw_close = false;
        while let Ok(frame) = rx.try_recv() {
            saw_close |= matches!(frame, OutboundFrame::Close { .. });
        }
        assert!(saw_close);
    }
}
