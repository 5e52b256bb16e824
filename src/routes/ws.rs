use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    middleware::auth::decode_token,
    models::event::WireFrame,
    services::broadcast_hub::{BroadcastHub, OutboundFrame},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Operator realtime feed. The token travels in the query string because
/// browsers cannot set headers on a WebSocket handshake.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let operator_id = query
        .token
        .as_deref()
        .and_then(|t| decode_token(t, &state.config.jwt_secret).ok())
        .and_then(|claims| claims.operator_id().ok());
    let hub = state.hub.clone();

    ws.on_upgrade(move |socket| async move {
        match operator_id {
            Some(operator_id) => serve(socket, hub, operator_id).await,
            None => reject(socket).await,
        }
    })
}

async fn reject(mut socket: WebSocket) {
    tracing::warn!("websocket rejected: missing or invalid token");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: Cow::from("Unauthorized"),
        })))
        .await;
}

async fn serve(socket: WebSocket, hub: Arc<BroadcastHub>, operator_id: Uuid) {
    let (id, mut rx) = hub.register(operator_id);
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let (message, closing) = match frame {
                OutboundFrame::Text(text) => (Message::Text(text.to_string()), false),
                OutboundFrame::Ping => (Message::Ping(Vec::new()), false),
                OutboundFrame::Close { code, reason } => (
                    Message::Close(Some(CloseFrame {
                        code,
                        reason: Cow::from(reason),
                    })),
                    true,
                ),
            };
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                hub.mark_alive(id);
                match message {
                    Message::Text(text) => {
                        let is_ping = serde_json::from_str::<WireFrame>(&text)
                            .map(|f| f.kind == "PING")
                            .unwrap_or(false);
                        if is_ping {
                            hub.reply_pong(id);
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = &mut writer => break,
        }
    }

    hub.unregister(id);
    writer.abort();
}
