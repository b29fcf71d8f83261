//! Depth capture pipeline.
//!
//! ```text
//! ┌──────────────────────────┐
//! │ scheduler (fixed rate)   │
//! │   ↓ render()             │
//! │ FrameSource              │
//! │   ↓ request_readback()   │
//! │ Readback (future)        │ ── spawned per tick ──┐
//! └──────────────────────────┘                       ↓
//!                               DepthEncoder (blocking worker)
//!                                  ↓
//!                               TopicChannel::send ──► Transport
//! ```
//!
//! | Module     | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `types`    | Depth frames and encoded images                    |
//! | `source`   | `FrameSource` trait, readback futures, test source |
//! | `encoder`  | Depth-to-grayscale mapping and PNG compression     |
//! | `pipeline` | Scheduler and per-tick orchestration               |

pub mod encoder;
pub mod pipeline;
pub mod source;
pub mod types;

pub use encoder::{DepthEncoder, ImageCodec, PngCodec, PngCompression, depth_to_gray};
pub use pipeline::{CapturePipeline, OverlapPolicy, PipelineConfig, PipelineStats, StatsSnapshot};
pub use source::{
    DepthPattern, FrameSource, Readback, ReadbackCompleter, ReadbackResult, SyntheticDepthSource,
};
pub use types::{DepthFrame, EncodedImage, PixelLayout};
