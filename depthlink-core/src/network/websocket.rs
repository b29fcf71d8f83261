//! WebSocket client transport for a rosbridge server.
//!
//! The socket is split once. A writer task owns the sink and drains a
//! queue of outgoing frames, so concurrent callers are serialized and
//! each caller learns whether its own frame was written. A reader task
//! drains whatever the server sends back (status and error reports) and
//! logs it.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::network::transport::Transport;

/// Depth of the outgoing frame queue.
const SEND_QUEUE: usize = 64;

struct Outgoing {
    text: String,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// A rosbridge connection over WebSocket.
#[derive(Debug)]
pub struct WebSocketTransport {
    tx: mpsc::Sender<Outgoing>,
}

impl std::fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outgoing").field("len", &self.text.len()).finish()
    }
}

impl WebSocketTransport {
    /// Connect to `url` (e.g. `ws://127.0.0.1:9090`).
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, TransportError> {
        info!("connecting to rosbridge at {url}");
        let (ws, _response) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        info!("connected to {url}");
        Ok(Self::from_stream(ws))
    }

    /// Wrap an already-established WebSocket stream.
    pub fn from_stream<S>(ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = ws.split();
        let (tx, mut rx) = mpsc::channel::<Outgoing>(SEND_QUEUE);

        // Writer task: queue -> socket
        tokio::spawn(async move {
            while let Some(out) = rx.recv().await {
                let result = sink
                    .send(Message::Text(out.text))
                    .await
                    .map_err(TransportError::from);
                let failed = result.is_err();
                if let Err(e) = &result {
                    warn!("websocket write error: {e}");
                }
                let _ = out.done.send(result);
                if failed {
                    break;
                }
            }
            let _ = sink.close().await;
            debug!("websocket writer stopped");
        });

        // Reader task: socket -> log
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => debug!("rosbridge: {text}"),
                    Ok(Message::Close(frame)) => {
                        info!("rosbridge closed the connection: {frame:?}");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("websocket read error: {e}");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Whether the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        let (done, result) = oneshot::channel();
        self.tx.send(Outgoing { text, done }).await?;
        result.await.map_err(|_| TransportError::Closed)?
    }
}
