//! Signaling for WebRTC play sessions.
//!
//! - `message`: wire model and JSON codec
//! - `transport`: signaling channel (WebSocket)
//! - `session`: offer/answer state machine

pub mod message;
pub mod session;
pub mod transport;

pub use message::*;
pub use session::*;
pub use transport::*;
