//! Per-topic advertise/publish state machine.
//!
//! ```text
//!  Unadvertised ──advertise()──► Advertised
//! ```
//!
//! The transition is one-way and happens when `advertise` is invoked,
//! not when the bridge confirms it: the transport has no acknowledgement.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::capture::types::EncodedImage;
use crate::error::{DepthLinkError, ProtocolError};
use crate::network::transport::Transport;
use crate::protocol::envelope::{CompressedImageMsg, DataEncoding, Envelope};
use crate::time::Stamp;

/// Message type the original bridge advertises for depth images.
pub const COMPRESSED_IMAGE_TYPE: &str = "sensor_msgs/msg/CompressedImage";

// ── TopicState ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicState {
    Unadvertised,
    Advertised,
}

impl std::fmt::Display for TopicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unadvertised => write!(f, "Unadvertised"),
            Self::Advertised => write!(f, "Advertised"),
        }
    }
}

// ── TopicChannel ─────────────────────────────────────────────────

/// One named, typed topic on a shared transport.
pub struct TopicChannel {
    topic: String,
    message_type: String,
    encoding: DataEncoding,
    advertised: AtomicBool,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for TopicChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicChannel")
            .field("topic", &self.topic)
            .field("message_type", &self.message_type)
            .field("encoding", &self.encoding)
            .field("state", &self.state())
            .finish()
    }
}

impl TopicChannel {
    /// Create an unadvertised channel.
    pub fn new(
        topic: impl Into<String>,
        message_type: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ProtocolError> {
        let topic = topic.into();
        let message_type = message_type.into();
        validate_name("topic name", &topic)?;
        validate_name("message type", &message_type)?;

        Ok(Self {
            topic,
            message_type,
            encoding: DataEncoding::default(),
            advertised: AtomicBool::new(false),
            transport,
        })
    }

    /// Set how image bytes are rendered in publish envelopes.
    pub fn with_data_encoding(mut self, encoding: DataEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn data_encoding(&self) -> DataEncoding {
        self.encoding
    }

    pub fn state(&self) -> TopicState {
        if self.advertised.load(Ordering::Acquire) {
            TopicState::Advertised
        } else {
            TopicState::Unadvertised
        }
    }

    pub fn is_advertised(&self) -> bool {
        self.state() == TopicState::Advertised
    }

    /// Transition to `Advertised` and build the advertise envelope.
    ///
    /// Valid from: `Unadvertised`. A second call fails with
    /// [`ProtocolError::AlreadyAdvertised`].
    pub fn advertise(&self) -> Result<Envelope, ProtocolError> {
        self.advertised
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ProtocolError::AlreadyAdvertised(self.topic.clone()))?;

        Ok(Envelope::Advertise {
            topic: self.topic.clone(),
            message_type: self.message_type.clone(),
        })
    }

    /// Build a publish envelope. Does not touch topic state.
    pub fn build_publish(&self, frame_id: &str, stamp: Stamp, image: &EncodedImage) -> Envelope {
        Envelope::Publish {
            topic: self.topic.clone(),
            msg: CompressedImageMsg::new(frame_id, stamp, image, self.encoding),
        }
    }

    /// Serialize `envelope` and hand it to the transport.
    ///
    /// A publish for this topic is refused while the topic is unadvertised.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), DepthLinkError> {
        if envelope.is_publish() && envelope.topic() == self.topic && !self.is_advertised() {
            return Err(ProtocolError::NotAdvertised(self.topic.clone()).into());
        }

        let text = envelope.to_json()?;
        debug!(topic = %envelope.topic(), op = envelope.op(), bytes = text.len(), "send");
        self.transport.send(text).await?;
        Ok(())
    }

    /// Advertise and send the envelope in one step.
    pub async fn advertise_and_send(&self) -> Result<(), DepthLinkError> {
        let envelope = self.advertise()?;
        self.send(&envelope).await
    }
}

fn validate_name(kind: &'static str, value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidName {
            kind,
            value: value.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::network::transport::ChannelTransport;
    use bytes::Bytes;

    fn channel() -> (TopicChannel, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let (t, rx) = ChannelTransport::new();
        let ch = TopicChannel::new("/camera/depth/compressed", COMPRESSED_IMAGE_TYPE, Arc::new(t))
            .unwrap();
        (ch, rx)
    }

    fn png(bytes: &[u8]) -> EncodedImage {
        EncodedImage {
            data: Bytes::copy_from_slice(bytes),
            format: "png",
            width: 2,
            height: 1,
        }
    }

    #[test]
    fn advertise_transitions_once() {
        let (ch, _rx) = channel();
        assert_eq!(ch.state(), TopicState::Unadvertised);

        let env = ch.advertise().unwrap();
        assert_eq!(ch.state(), TopicState::Advertised);
        assert_eq!(
            env,
            Envelope::Advertise {
                topic: "/camera/depth/compressed".into(),
                message_type: COMPRESSED_IMAGE_TYPE.into(),
            }
        );

        let err = ch.advertise().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::AlreadyAdvertised("/camera/depth/compressed".into())
        );
        assert_eq!(ch.state(), TopicState::Advertised);
    }

    #[test]
    fn build_publish_does_not_change_state() {
        let (ch, _rx) = channel();
        let env = ch.build_publish("camera", Stamp::new(1, 2), &png(&[1, 2]));
        assert!(env.is_publish());
        assert_eq!(ch.state(), TopicState::Unadvertised);

        ch.advertise().unwrap();
        let _ = ch.build_publish("camera", Stamp::new(1, 2), &png(&[1, 2]));
        assert_eq!(ch.state(), TopicState::Advertised);
    }

    #[test]
    fn rejects_bad_names() {
        let (t, _rx) = ChannelTransport::new();
        let t: Arc<dyn Transport> = Arc::new(t);
        assert!(TopicChannel::new("", COMPRESSED_IMAGE_TYPE, t.clone()).is_err());
        assert!(TopicChannel::new("/a b", COMPRESSED_IMAGE_TYPE, t.clone()).is_err());
        assert!(TopicChannel::new("/ok", "", t).is_err());
    }

    #[tokio::test]
    async fn publish_before_advertise_is_refused() {
        let (ch, mut rx) = channel();
        let env = ch.build_publish("camera", Stamp::new(1, 0), &png(&[9]));
        let err = ch.send(&env).await.unwrap_err();
        assert!(matches!(
            err,
            DepthLinkError::Protocol(ProtocolError::NotAdvertised(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn advertise_then_publish_on_the_wire() {
        let (ch, mut rx) = channel();
        ch.advertise_and_send().await.unwrap();

        let env = ch.build_publish("camera", Stamp::from_unix_millis(2_500), &png(&[7, 8]));
        ch.send(&env).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            r#"{"op":"advertise","topic":"/camera/depth/compressed","type":"sensor_msgs/msg/CompressedImage"}"#
        );
        let second = rx.recv().await.unwrap();
        assert_eq!(
            second,
            r#"{"op":"publish","topic":"/camera/depth/compressed","msg":{"header":{"stamp":{"secs":2,"nsecs":500000000},"frame_id":"camera"},"format":"png","data":[7,8]}}"#
        );
    }

    #[tokio::test]
    async fn base64_channel_sends_string_data() {
        let (t, mut rx) = ChannelTransport::new();
        let ch = TopicChannel::new("/d", COMPRESSED_IMAGE_TYPE, Arc::new(t))
            .unwrap()
            .with_data_encoding(DataEncoding::Base64);
        ch.advertise_and_send().await.unwrap();
        ch.send(&ch.build_publish("camera", Stamp::default(), &png(&[0xff, 0x00, 0x10])))
            .await
            .unwrap();
        let _ = rx.recv().await.unwrap();
        assert!(rx.recv().await.unwrap().contains(r#""data":"/wAQ""#));
    }

    #[tokio::test]
    async fn transport_failure_surfaces() {
        let (t, rx) = ChannelTransport::new();
        drop(rx);
        let ch = TopicChannel::new("/d", COMPRESSED_IMAGE_TYPE, Arc::new(t)).unwrap();
        let err = ch.advertise_and_send().await.unwrap_err();
        assert!(matches!(err, DepthLinkError::Transport(TransportError::Closed)));
        // Optimistic: the state flipped even though the send failed.
        assert!(ch.is_advertised());
    }
}
