//! webrtc-play - WebRTC play client for streaming servers
//!
//! Negotiates a receive-only WebRTC session with a streaming server over a
//! WebSocket signaling channel:
//! - JSON signaling codec (`getOffer` / `sendResponse`)
//! - Offer/answer state machine with ordered ICE candidate handling
//! - webrtc-rs peer connection adapter
//!
//! Media decoding and rendering are left to the host.

pub mod client;
pub mod config;
pub mod error;
pub mod ice;
pub mod peer;
pub mod signaling;

pub use client::PlayClient;
pub use config::PlayConfig;
pub use error::{
    ConfigError, DecodeError, Error, NegotiationError, PeerError, ProtocolError, SessionError, TransportError,
};
pub use ice::{google_stun_servers, IceServerConfig};
pub use peer::{NegotiationRole, PeerConnectionAdapter, PeerEvent, PeerStats, RtcPeer};
pub use signaling::{
    ChannelEvent, ChannelTransport, Inbound, SessionState, SignalingCodec, SignalingMessage, SignalingSession,
    StreamIdentity, WebSocketTransport,
};
