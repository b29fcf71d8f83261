//! rosbridge protocol: JSON envelopes and the per-topic state machine.

pub mod envelope;
pub mod topic;

pub use envelope::{CompressedImageMsg, DataEncoding, Envelope, Header, ImageData};
pub use topic::{COMPRESSED_IMAGE_TYPE, TopicChannel, TopicState};
