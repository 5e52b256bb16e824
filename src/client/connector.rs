use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Error as WsError, Message,
    },
};
use url::Url;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The server refused the credentials; retrying cannot help.
    #[error("connection rejected: {0}")]
    Rejected(String),
    #[error("connection failed: {0}")]
    Failed(String),
}

/// An open socket as a pair of queues. The incoming queue ends without a
/// `Close` frame when the transport drops abnormally.
pub struct Connection {
    pub outgoing: mpsc::UnboundedSender<ClientFrame>,
    pub incoming: mpsc::UnboundedReceiver<ClientFrame>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Connection, ConnectError>;
}

pub struct WsConnector {
    url: Url,
    timeout: Duration,
}

impl WsConnector {
    pub fn new(base: &Url, token: &str) -> Result<Self, ConnectError> {
        let mut url = base
            .join("/ws")
            .map_err(|e| ConnectError::Failed(format!("invalid realtime url: {e}")))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ConnectError::Failed(format!("cannot use scheme {scheme}")))?;
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(Self {
            url,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, ConnectError> {
        let (ws_stream, _) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| ConnectError::Failed("timeout connecting to realtime feed".to_string()))?
            .map_err(|e| match e {
                WsError::Http(resp) if matches!(resp.status().as_u16(), 401 | 403) => {
                    ConnectError::Rejected(format!("handshake returned {}", resp.status()))
                }
                other => ConnectError::Failed(other.to_string()),
            })?;

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ClientFrame>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(ClientFrame::Text(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ClientFrame::Close { code, reason }) => {
                            let _ = write
                                .send(Message::Close(Some(CloseFrame {
                                    code: CloseCode::from(code),
                                    reason: reason.into(),
                                })))
                                .await;
                            break;
                        }
                        None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = in_tx.send(ClientFrame::Text(text));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.into_owned()))
                                .unwrap_or((1005, String::new()));
                            let _ = in_tx.send(ClientFrame::Close { code, reason });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "realtime socket error");
                            break;
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(Connection {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
