//! JSON envelopes for the rosbridge protocol.
//!
//! # Wire format
//!
//! ```text
//! {"op":"advertise","topic":"<name>","type":"<ros-message-type>"}
//!
//! {"op":"publish","topic":"<name>","msg":{
//!     "header":{"stamp":{"secs":<int>,"nsecs":<int>},"frame_id":"<id>"},
//!     "format":"png",
//!     "data":[<int>,<int>,...]}}
//! ```
//!
//! `data` is a JSON array of byte values by default. With
//! [`DataEncoding::Base64`] it is a base64 string instead, which is about
//! a quarter of the size on the wire.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::capture::types::EncodedImage;
use crate::error::EncodeError;
use crate::time::Stamp;

// ── Envelope ─────────────────────────────────────────────────────

/// One protocol operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Envelope {
    /// Declare a topic and its message type.
    Advertise {
        topic: String,
        #[serde(rename = "type")]
        message_type: String,
    },
    /// Publish one compressed image on a topic.
    Publish {
        topic: String,
        msg: CompressedImageMsg,
    },
}

impl Envelope {
    /// Topic this envelope refers to.
    pub fn topic(&self) -> &str {
        match self {
            Envelope::Advertise { topic, .. } | Envelope::Publish { topic, .. } => topic,
        }
    }

    /// The `op` field value.
    pub fn op(&self) -> &'static str {
        match self {
            Envelope::Advertise { .. } => "advertise",
            Envelope::Publish { .. } => "publish",
        }
    }

    pub fn is_publish(&self) -> bool {
        matches!(self, Envelope::Publish { .. })
    }

    /// Render as a single-line JSON text frame.
    pub fn to_json(&self) -> Result<String, EncodeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, EncodeError> {
        Ok(serde_json::from_str(text)?)
    }
}

// ── CompressedImageMsg ───────────────────────────────────────────

/// Body of a `sensor_msgs/CompressedImage` publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedImageMsg {
    pub header: Header,
    pub format: String,
    pub data: ImageData,
}

impl CompressedImageMsg {
    pub fn new(frame_id: &str, stamp: Stamp, image: &EncodedImage, encoding: DataEncoding) -> Self {
        Self {
            header: Header {
                stamp,
                frame_id: frame_id.to_owned(),
            },
            format: image.format.to_owned(),
            data: ImageData::encode(&image.data, encoding),
        }
    }
}

/// `std_msgs/Header` without the sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    pub frame_id: String,
}

// ── ImageData ────────────────────────────────────────────────────

/// How image bytes are rendered in the `data` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataEncoding {
    /// `[137,80,78,71,...]`
    #[default]
    IntArray,
    /// `"iVBORw0KGgo..."`
    Base64,
}

/// Image payload as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageData {
    Bytes(Vec<u8>),
    Base64(String),
}

impl ImageData {
    pub fn encode(bytes: &[u8], encoding: DataEncoding) -> Self {
        match encoding {
            DataEncoding::IntArray => ImageData::Bytes(bytes.to_vec()),
            DataEncoding::Base64 => ImageData::Base64(BASE64.encode(bytes)),
        }
    }

    /// The raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, EncodeError> {
        match self {
            ImageData::Bytes(b) => Ok(b.clone()),
            ImageData::Base64(s) => Ok(BASE64.decode(s)?),
        }
    }

    pub fn encoding(&self) -> DataEncoding {
        match self {
            ImageData::Bytes(_) => DataEncoding::IntArray,
            ImageData::Base64(_) => DataEncoding::Base64,
        }
    }
}
