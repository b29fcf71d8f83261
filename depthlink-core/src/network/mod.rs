//! Transports carrying JSON envelopes to the bridge.
//!
//! | Module      | Purpose                                         |
//! |-------------|-------------------------------------------------|
//! | `transport` | `Transport` trait and the in-memory transport   |
//! | `websocket` | rosbridge WebSocket client with a single writer |

pub mod transport;
pub mod websocket;

pub use transport::{ChannelTransport, Transport};
pub use websocket::WebSocketTransport;
