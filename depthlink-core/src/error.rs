//! Domain-specific error types for the depth bridge.
//!
//! Every failure in the capture pipeline is scoped to a single tick:
//! the tick is dropped and logged, and the next one proceeds on its own.
//! Only startup failures (invalid configuration, connect, advertise) are
//! surfaced to the caller.

use thiserror::Error;

/// The canonical error type for the depth bridge.
#[derive(Debug, Error)]
pub enum DepthLinkError {
    /// Readback of a rendered frame failed.
    #[error(transparent)]
    Readback(#[from] ReadbackError),

    /// Encoding a frame or serializing an envelope failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The transport refused or failed to send a message.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A topic operation violated the advertise/publish protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start` was called on a pipeline that is already running.
    #[error("pipeline already running")]
    AlreadyRunning,

    /// A spawned task panicked or was aborted.
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ── ReadbackError ────────────────────────────────────────────────

/// Failure moving a rendered frame into host memory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadbackError {
    /// The device or driver reported an error for this request.
    #[error("readback failed: {0}")]
    Device(String),

    /// The frame source dropped the request without completing it.
    #[error("readback request abandoned")]
    Abandoned,
}

// ── EncodeError ──────────────────────────────────────────────────

/// Failure turning depth samples into an image or an envelope into text.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The flat sample array does not cover `width * height` pixels.
    #[error("sample count mismatch: expected {expected}, got {actual}")]
    SampleCountMismatch { expected: usize, actual: usize },

    /// Width or height is zero, or their product overflows.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The image codec rejected the pixel buffer.
    #[error("codec error: {0}")]
    Codec(String),

    /// The envelope could not be rendered to or parsed from JSON.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A base64 payload could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl From<image::ImageError> for EncodeError {
    fn from(e: image::ImageError) -> Self {
        EncodeError::Codec(e.to_string())
    }
}

// ── TransportError ───────────────────────────────────────────────

/// Failure handing a message to the connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection (or its writer task) is gone.
    #[error("transport closed")]
    Closed,

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connecting did not finish in time.
    #[error("connect timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for TransportError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        TransportError::Closed
    }
}

// ── ProtocolError ────────────────────────────────────────────────

/// Violations of the advertise-before-publish protocol.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `advertise` was called on a topic that is already advertised.
    #[error("topic {0} is already advertised")]
    AlreadyAdvertised(String),

    /// A publish was sent for a topic that was never advertised.
    #[error("topic {0} has not been advertised")]
    NotAdvertised(String),

    /// A topic name or message type is empty or contains whitespace.
    #[error("invalid {kind}: {value:?}")]
    InvalidName { kind: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = EncodeError::SampleCountMismatch {
            expected: 8,
            actual: 3,
        };
        assert!(e.to_string().contains('8'));
        assert!(e.to_string().contains('3'));

        let e = ProtocolError::AlreadyAdvertised("/depth".into());
        assert!(e.to_string().contains("/depth"));
    }

    #[test]
    fn wraps_into_depthlink_error() {
        let e: DepthLinkError = ReadbackError::Abandoned.into();
        assert!(matches!(e, DepthLinkError::Readback(ReadbackError::Abandoned)));

        let e: DepthLinkError = TransportError::Closed.into();
        assert_eq!(e.to_string(), "transport closed");
    }

    #[test]
    fn closed_channel_is_transport_closed() {
        let e: TransportError = tokio::sync::mpsc::error::SendError("frame").into();
        assert!(matches!(e, TransportError::Closed));
    }
}
