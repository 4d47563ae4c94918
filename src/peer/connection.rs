//! webrtc-rs peer connection adapter.
//!
//! Wraps RTCPeerConnection for a receive-only play session. Remote tracks are
//! drained and counted; decoding and rendering belong to the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex as ParkingMutex;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

use super::{PeerConnectionAdapter, PeerEvent};
use crate::error::PeerError;
use crate::ice::IceServerConfig;
use crate::signaling::{IceCandidate, SdpKind, SessionDescription};

/// Remote media counters (atomic, lock-free)
#[derive(Default)]
pub struct PeerStats {
    pub packets_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub tracks: AtomicU64,
}

type EventSender = Arc<ParkingMutex<Option<mpsc::UnboundedSender<PeerEvent>>>>;

/// webrtc-rs implementation of [`PeerConnectionAdapter`]
pub struct RtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
    events: EventSender,
    pub stats: Arc<PeerStats>,
}

impl RtcPeer {
    /// Create a peer connection and hook up its observation callbacks.
    ///
    /// Returns the peer and the receiver for its [`PeerEvent`]s.
    pub async fn new(
        ice_servers: &[IceServerConfig],
    ) -> Result<(Self, mpsc::UnboundedReceiver<PeerEvent>), PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| PeerError(format!("Failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| PeerError(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(IceServerConfig::to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| PeerError(format!("Failed to create peer connection: {}", e)))?,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let events: EventSender = Arc::new(ParkingMutex::new(Some(tx)));
        let stats = Arc::new(PeerStats::default());

        let events_for_ice = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            if let Some(c) = candidate.and_then(|c| c.to_json().ok()) {
                emit(
                    &events_for_ice,
                    PeerEvent::LocalCandidate(IceCandidate {
                        candidate: c.candidate,
                        sdp_mid: c.sdp_mid.unwrap_or_default(),
                        sdp_mline_index: c.sdp_mline_index.unwrap_or_default(),
                    }),
                );
            }
            Box::pin(async {})
        }));

        let events_for_gathering = events.clone();
        peer_connection.on_ice_gathering_state_change(Box::new(move |state: RTCIceGathererState| {
            emit(&events_for_gathering, PeerEvent::GatheringState(state.to_string()));
            Box::pin(async {})
        }));

        let events_for_state = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            emit(&events_for_state, PeerEvent::ConnectionState(state.to_string()));
            Box::pin(async {})
        }));

        let events_for_track = events.clone();
        let stats_for_track = stats.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let mime_type = track.codec().capability.mime_type;
                emit(&events_for_track, PeerEvent::Track(mime_type.clone()));

                let stats = stats_for_track.clone();
                stats.tracks.fetch_add(1, Ordering::Relaxed);
                Box::pin(async move {
                    drain_track(track, mime_type, stats).await;
                })
            },
        ));

        Ok((
            Self {
                peer_connection,
                events,
                stats,
            },
            rx,
        ))
    }

    /// Get the peer connection for advanced usage
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }
}

fn emit(events: &EventSender, event: PeerEvent) {
    if let Some(tx) = events.lock().as_ref() {
        let _ = tx.send(event);
    }
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription, PeerError> {
    match description.kind {
        SdpKind::Offer => RTCSessionDescription::offer(description.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(description.sdp),
    }
    .map_err(|e| PeerError(format!("Invalid SDP: {}", e)))
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription, PeerError> {
    let kind = match description.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        other => return Err(PeerError(format!("Unsupported SDP type: {}", other))),
    };
    Ok(SessionDescription {
        kind,
        sdp: description.sdp,
    })
}

#[async_trait]
impl PeerConnectionAdapter for RtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| PeerError(format!("Failed to create offer: {}", e)))?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(|e| PeerError(format!("Failed to create answer: {}", e)))?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerError> {
        self.peer_connection
            .set_local_description(to_rtc(description)?)
            .await
            .map_err(|e| PeerError(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), PeerError> {
        self.peer_connection
            .set_remote_description(to_rtc(description)?)
            .await
            .map_err(|e| PeerError(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), PeerError> {
        let candidate_init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.sdp_mid),
            sdp_mline_index: Some(candidate.sdp_mline_index),
            username_fragment: None,
        };

        self.peer_connection
            .add_ice_candidate(candidate_init)
            .await
            .map_err(|e| PeerError(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<(), PeerError> {
        // Late callbacks stop reporting once the connection is released
        self.events.lock().take();
        self.peer_connection
            .close()
            .await
            .map_err(|e| PeerError(format!("Failed to close peer connection: {}", e)))
    }
}

/// Read RTP from a remote track until it ends, counting packets.
async fn drain_track(track: Arc<TrackRemote>, label: String, stats: Arc<PeerStats>) {
    loop {
        match track.read_rtp().await {
            Ok((rtp_packet, _attributes)) => {
                stats.packets_received.fetch_add(1, Ordering::Relaxed);
                stats
                    .bytes_received
                    .fetch_add(rtp_packet.payload.len() as u64, Ordering::Relaxed);
            }
            Err(e) => {
                debug!("Remote {} track ended: {}", label, e);
                break;
            }
        }
    }
    info!("Remote {} track finished", label);
}
