//! Peer connection seam.
//!
//! The session drives the peer connection only through
//! [`PeerConnectionAdapter`]. [`RtcPeer`] implements it on top of webrtc-rs.

pub mod connection;

pub use connection::*;

use async_trait::async_trait;

use crate::error::PeerError;
use crate::signaling::{IceCandidate, SessionDescription};

/// Which side's description is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Local,
    Remote,
}

/// Operations the session needs from a peer connection.
///
/// Description operations may take arbitrarily long; the session never
/// issues two of the same class at once.
#[async_trait]
pub trait PeerConnectionAdapter: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, PeerError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerError>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), PeerError>;

    /// Best effort; a failure affects only this candidate
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError>;

    /// Release the underlying connection
    async fn close(&self) -> Result<(), PeerError>;
}

/// Observations from the peer connection, for the host to log or act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Locally gathered ICE candidate
    LocalCandidate(IceCandidate),
    /// ICE gathering state changed
    GatheringState(String),
    /// Connection state changed
    ConnectionState(String),
    /// Remote track arrived (MIME type)
    Track(String),
}
