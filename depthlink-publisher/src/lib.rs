//! # depthlink-publisher — Depth Camera Publisher
//!
//! Service that renders depth frames, encodes them as grayscale PNG and
//! streams them to a rosbridge server as
//! `sensor_msgs/msg/CompressedImage` messages on one topic.
//!
//! ## Modes
//!
//! - **Bridge** (default): connect to the rosbridge WebSocket in the config.
//! - **Dry run**: publish into an in-memory transport and log envelopes.

pub mod config;
pub mod service;
