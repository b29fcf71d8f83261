use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A message-oriented connection carrying JSON text frames.
///
/// Sends on one transport are delivered in call order, and two concurrent
/// sends never interleave on the wire. There is no response channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand one text frame to the connection.
    async fn send(&self, text: String) -> Result<(), TransportError>;
}

/// In-memory transport: every sent frame is pushed onto an unbounded
/// channel. Used for dry runs and tests.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    /// A transport plus the receiver that observes its frames.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, text: String) -> Result<(), TransportError> {
        self.tx.send(text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_preserves_order() {
        let (t, mut rx) = ChannelTransport::new();
        for i in 0..5 {
            t.send(format!("m{i}")).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), format!("m{i}"));
        }
    }

    #[tokio::test]
    async fn dropped_receiver_closes() {
        let (t, rx) = ChannelTransport::new();
        drop(rx);
        assert!(t.is_closed());
        let err = t.send("x".into()).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }
}
