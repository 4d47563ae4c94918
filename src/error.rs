//! Error types for signaling, transport and negotiation.

use thiserror::Error;

use crate::peer::NegotiationRole;
use crate::signaling::{SdpKind, SessionState};

/// Inbound frame could not be turned into a signaling message
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed signaling message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Signaling message is missing field '{0}'")]
    MissingField(&'static str),

    #[error("Unknown signaling command: {0}")]
    UnknownCommand(String),
}

/// Signaling channel failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to connect to signaling server: {0}")]
    Connect(String),

    #[error("Signaling channel is closed")]
    Closed,

    #[error("Signaling channel outbound queue is full")]
    Backpressure,

    #[error("Signaling channel I/O error: {0}")]
    Io(String),
}

/// Failure reported by the peer-connection collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PeerError(pub String);

impl PeerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// An asynchronous description operation failed; the attempt is aborted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("Failed to set {role:?} description: {detail}")]
    SetDescriptionFailed {
        role: NegotiationRole,
        detail: String,
    },

    #[error("Failed to create {kind:?}: {detail}")]
    CreateDescriptionFailed { kind: SdpKind, detail: String },
}

/// A message arrived that violates the expected exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected description kind: expected {expected:?}, got {actual:?}")]
    UnexpectedDescriptionKind { expected: SdpKind, actual: SdpKind },

    #[error("Offer received while {state:?}")]
    UnsolicitedOffer { state: SessionState },

    #[error("Server rejected request with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

/// Outcome of a single session step
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Failed to encode signaling message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Invalid client configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid signaling URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Peer connection error: {0}")]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Session task failed: {0}")]
    Task(String),
}
