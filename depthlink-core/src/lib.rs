//! # depthlink-core
//!
//! Streams rendered depth frames to a rosbridge server as
//! `sensor_msgs/CompressedImage` messages.
//!
//! This crate contains:
//! - **Capture**: `CapturePipeline` (fixed-rate scheduler), `FrameSource`
//!   with future-based readback, `DepthEncoder` (grayscale PNG)
//! - **Protocol**: rosbridge `Envelope`s and the per-topic `TopicChannel`
//!   advertise/publish state machine
//! - **Network**: the `Transport` trait, a WebSocket client and an
//!   in-memory channel transport
//! - **Time**: `Stamp` (`secs`/`nsecs`) and injectable clocks
//! - **Error**: `DepthLinkError` — typed, `thiserror`-based error hierarchy

pub mod capture;
pub mod error;
pub mod network;
pub mod protocol;
pub mod time;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{
    CapturePipeline, DepthEncoder, DepthFrame, DepthPattern, EncodedImage, FrameSource,
    ImageCodec, OverlapPolicy, PipelineConfig, PixelLayout, PngCodec, PngCompression, Readback,
    ReadbackCompleter, StatsSnapshot, SyntheticDepthSource,
};
pub use error::{DepthLinkError, EncodeError, ProtocolError, ReadbackError, TransportError};
pub use network::{ChannelTransport, Transport, WebSocketTransport};
pub use protocol::{
    COMPRESSED_IMAGE_TYPE, CompressedImageMsg, DataEncoding, Envelope, TopicChannel, TopicState,
};
pub use time::{Clock, FixedClock, Stamp, SystemClock};
