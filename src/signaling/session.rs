//! Play-side signaling state machine.
//!
//! Flow:
//! 1. Channel opens: send `getOffer` with the stream identity
//! 2. Server replies with its offer and our session id
//! 3. Apply the offer as remote description, create and apply an answer
//! 4. Send the applied answer back with `sendResponse`
//! 5. Apply the server's ICE candidates as they arrive
//!
//! One task owns the session. Channel events and completions of peer
//! operations both reach it through [`SignalingSession::run`], so no
//! callback ever touches session state directly. At most one description
//! operation is in flight; while it is pending the session keeps handling
//! channel events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};

use super::message::{
    IceCandidate, Inbound, SdpKind, SessionDescription, SignalingCodec, SignalingMessage, StreamIdentity,
    UserData,
};
use super::transport::{ChannelEvent, ChannelTransport, CLOSE_ABNORMAL};
use crate::error::{DecodeError, NegotiationError, PeerError, ProtocolError, SessionError};
use crate::peer::{NegotiationRole, PeerConnectionAdapter};

/// Negotiation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingOfferResponse,
    Negotiating,
    Stable,
    Closed,
}

/// Outcome of an asynchronous peer-connection operation
#[derive(Debug)]
pub enum Completion {
    Created {
        kind: SdpKind,
        result: Result<SessionDescription, PeerError>,
    },
    Applied {
        role: NegotiationRole,
        description: SessionDescription,
        result: Result<(), PeerError>,
    },
}

type Operation = Pin<Box<dyn Future<Output = Completion> + Send>>;

/// Negotiates one play session over one channel and one peer connection
pub struct SignalingSession<T: ChannelTransport> {
    application_name: String,
    stream_name: String,
    user_data: Option<UserData>,
    /// Built when the channel opens
    stream_info: Option<StreamIdentity>,
    state: SessionState,
    peer: Arc<dyn PeerConnectionAdapter>,
    transport: T,
    in_flight: Option<Operation>,
    remote_applied: bool,
    /// The remote description failed to apply; candidates have nowhere to go
    remote_failed: bool,
    /// Candidates received before the remote description was applied
    pending_candidates: Vec<IceCandidate>,
    errors: Option<mpsc::UnboundedSender<SessionError>>,
}

impl<T: ChannelTransport> SignalingSession<T> {
    pub fn new(
        application_name: &str,
        stream_name: &str,
        peer: Arc<dyn PeerConnectionAdapter>,
        transport: T,
    ) -> Self {
        Self {
            application_name: application_name.to_string(),
            stream_name: stream_name.to_string(),
            user_data: None,
            stream_info: None,
            state: SessionState::Idle,
            peer,
            transport,
            in_flight: None,
            remote_applied: false,
            remote_failed: false,
            pending_candidates: Vec::new(),
            errors: None,
        }
    }

    /// Send `user_data` along with the play request
    pub fn with_user_data(mut self, user_data: Option<UserData>) -> Self {
        self.user_data = user_data;
        self
    }

    /// Forward every failed step to `errors` in addition to logging it
    pub fn with_error_sink(mut self, errors: mpsc::UnboundedSender<SessionError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stream_info(&self) -> Option<&StreamIdentity> {
        self.stream_info.as_ref()
    }

    pub fn has_pending_operation(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Drive the session until it is closed.
    ///
    /// `shutdown` firing (or its sender being dropped) tears the session down.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ChannelEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> Option<StreamIdentity> {
        while self.state != SessionState::Closed {
            tokio::select! {
                completion = poll_operation(&mut self.in_flight) => {
                    self.in_flight = None;
                    if let Err(e) = self.handle_completion(completion).await {
                        self.report(e);
                    }
                }
                event = events.recv() => {
                    let event = event.unwrap_or(ChannelEvent::Close {
                        code: CLOSE_ABNORMAL,
                        reason: "event queue closed".to_string(),
                    });
                    if let Err(e) = self.handle_channel_event(event).await {
                        self.report(e);
                    }
                }
                _ = &mut shutdown => {
                    self.teardown().await;
                }
            }
        }

        self.stream_info
    }

    /// Wait for the in-flight peer operation, if any
    pub async fn next_completion(&mut self) -> Option<Completion> {
        let operation = self.in_flight.as_mut()?;
        let completion = operation.await;
        self.in_flight = None;
        Some(completion)
    }

    /// Handle one event from the signaling channel
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            debug!("Session closed, ignoring {:?}", event);
            return Ok(());
        }

        match event {
            ChannelEvent::Open => self.on_open().await,
            ChannelEvent::Message(data) => self.on_message(&data).await,
            ChannelEvent::Close { code, reason } => {
                info!("Signaling channel closed: code {}, reason '{}'", code, reason);
                self.close().await;
                Ok(())
            }
            ChannelEvent::Error(detail) => {
                error!("Signaling channel error: {}", detail);
                self.close().await;
                Ok(())
            }
        }
    }

    /// Handle the result of a create/apply operation
    pub async fn handle_completion(&mut self, completion: Completion) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            debug!("Session closed, discarding {:?}", completion);
            return Ok(());
        }

        match completion {
            Completion::Applied {
                role, result: Err(e), ..
            } => {
                if role == NegotiationRole::Remote {
                    self.remote_failed = true;
                    self.pending_candidates.clear();
                }
                Err(NegotiationError::SetDescriptionFailed { role, detail: e.0 }.into())
            }
            Completion::Applied {
                role: NegotiationRole::Remote,
                description,
                result: Ok(()),
            } => {
                debug!("Remote {:?} applied", description.kind);
                self.remote_applied = true;

                let queued = std::mem::take(&mut self.pending_candidates);
                Self::add_candidates(&self.peer, queued).await;

                if description.kind == SdpKind::Offer {
                    self.create_description(SdpKind::Answer);
                }
                Ok(())
            }
            Completion::Applied {
                role: NegotiationRole::Local,
                description,
                result: Ok(()),
            } => {
                debug!("Local {:?} applied", description.kind);
                let kind = description.kind;
                self.send_description(description).await?;
                if kind == SdpKind::Answer {
                    self.transition(SessionState::Stable);
                }
                Ok(())
            }
            Completion::Created { kind, result: Err(e) } => {
                Err(NegotiationError::CreateDescriptionFailed { kind, detail: e.0 }.into())
            }
            Completion::Created {
                result: Ok(description),
                ..
            } => {
                self.apply_description(NegotiationRole::Local, description);
                Ok(())
            }
        }
    }

    /// Close the session on request of the owner
    pub async fn teardown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        info!("Tearing down signaling session");
        self.close().await;
    }

    async fn on_open(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            warn!("Channel open while {:?}, ignoring", self.state);
            return Ok(());
        }

        let stream_info = StreamIdentity::new(&self.application_name, &self.stream_name);
        let msg = SignalingMessage::get_offer(&stream_info, self.user_data.clone());
        self.stream_info = Some(stream_info);

        self.send(&msg).await?;
        self.transition(SessionState::AwaitingOfferResponse);
        Ok(())
    }

    async fn on_message(&mut self, data: &[u8]) -> Result<(), SessionError> {
        debug!("Received: {}", String::from_utf8_lossy(data).replace('\n', ""));

        let inbound = match SignalingCodec::decode_inbound(data) {
            Ok(inbound) => inbound,
            Err(DecodeError::UnknownCommand(command)) => {
                warn!("Ignoring message with unknown command '{}'", command);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        match inbound {
            Inbound::Offer {
                stream_info,
                description,
            } => self.on_offer(stream_info, description),
            Inbound::Candidates(candidates) => {
                self.on_candidates(candidates).await;
                Ok(())
            }
            Inbound::Description(description) => {
                debug!("Description-only response ({:?}), nothing to do", description.kind);
                Ok(())
            }
            Inbound::Empty => {
                debug!("Empty response, nothing to do");
                Ok(())
            }
            Inbound::Rejected {
                command,
                status,
                description,
            } => {
                warn!("Server rejected {} with status {}", command.as_str(), status);
                Err(ProtocolError::Rejected { status, description }.into())
            }
        }
    }

    fn on_offer(&mut self, remote: StreamIdentity, description: SessionDescription) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingOfferResponse {
            return Err(ProtocolError::UnsolicitedOffer { state: self.state }.into());
        }
        if description.kind != SdpKind::Offer {
            return Err(ProtocolError::UnexpectedDescriptionKind {
                expected: SdpKind::Offer,
                actual: description.kind,
            }
            .into());
        }

        if let Some(stream_info) = self.stream_info.as_mut() {
            if stream_info.assign_session_id(&remote.session_id) {
                info!("Session id assigned: {}", stream_info.session_id.as_str());
            } else {
                warn!("Offer carried no session id");
            }
        }

        self.apply_description(NegotiationRole::Remote, description);
        self.transition(SessionState::Negotiating);
        Ok(())
    }

    async fn on_candidates(&mut self, candidates: Vec<IceCandidate>) {
        if self.remote_failed {
            debug!(
                "Dropping {} ICE candidate(s), remote description was not applied",
                candidates.len()
            );
            return;
        }
        if !self.remote_applied {
            debug!(
                "Queueing {} ICE candidate(s) until the remote description is applied",
                candidates.len()
            );
            self.pending_candidates.extend(candidates);
            return;
        }
        Self::add_candidates(&self.peer, candidates).await;
    }

    /// Apply candidates in order; a failure only affects that candidate
    async fn add_candidates(peer: &Arc<dyn PeerConnectionAdapter>, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            let line = candidate.candidate.clone();
            match peer.add_ice_candidate(candidate).await {
                Ok(()) => debug!("Added remote ICE candidate: {}", line),
                Err(e) => warn!("Failed to add ICE candidate '{}': {}", line, e),
            }
        }
    }

    /// Start setting a local or remote description
    fn apply_description(&mut self, role: NegotiationRole, description: SessionDescription) {
        debug_assert!(self.in_flight.is_none(), "description operation already in flight");

        let peer = self.peer.clone();
        self.in_flight = Some(Box::pin(async move {
            let result = match role {
                NegotiationRole::Local => peer.set_local_description(description.clone()).await,
                NegotiationRole::Remote => peer.set_remote_description(description.clone()).await,
            };
            Completion::Applied {
                role,
                description,
                result,
            }
        }));
    }

    /// Start creating a local offer or answer
    fn create_description(&mut self, kind: SdpKind) {
        debug_assert!(self.in_flight.is_none(), "description operation already in flight");

        let peer = self.peer.clone();
        self.in_flight = Some(Box::pin(async move {
            let result = match kind {
                SdpKind::Offer => peer.create_offer().await,
                SdpKind::Answer => peer.create_answer().await,
            };
            Completion::Created { kind, result }
        }));
    }

    async fn send_description(&mut self, description: SessionDescription) -> Result<(), SessionError> {
        let Some(stream_info) = self.stream_info.as_ref() else {
            return Ok(());
        };
        let msg = SignalingMessage::description(stream_info, description);
        self.send(&msg).await
    }

    async fn send(&mut self, msg: &SignalingMessage) -> Result<(), SessionError> {
        let data = SignalingCodec::encode(msg).map_err(SessionError::Encode)?;
        debug!("Sending: {}", String::from_utf8_lossy(&data));
        self.transport.send(data).await?;
        Ok(())
    }

    async fn close(&mut self) {
        self.transition(SessionState::Closed);
        self.in_flight = None;
        self.pending_candidates.clear();

        if let Err(e) = self.peer.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
        self.transport.close().await;
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            info!("Signaling state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn report(&self, e: SessionError) {
        match &e {
            SessionError::Decode(_) | SessionError::Protocol(_) => warn!("Dropping signaling message: {}", e),
            _ => error!("{}", e),
        }
        if let Some(errors) = &self.errors {
            let _ = errors.send(e);
        }
    }
}

async fn poll_operation(slot: &mut Option<Operation>) -> Completion {
    match slot {
        Some(operation) => operation.await,
        None => std::future::pending().await,
    }
}
