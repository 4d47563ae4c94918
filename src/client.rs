//! Play client.
//!
//! Connects the signaling channel, creates the peer connection once the
//! channel is up, and runs a [`SignalingSession`] on its own task.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::PlayConfig;
use crate::error::{Error, SessionError};
use crate::peer::{PeerConnectionAdapter, PeerEvent, PeerStats, RtcPeer};
use crate::signaling::{ChannelEvent, ChannelTransport, SignalingSession, StreamIdentity, WebSocketTransport};

/// Running play session
pub struct PlayClient {
    task: Option<JoinHandle<Option<StreamIdentity>>>,
    /// Dropping this tears the session down as well
    shutdown_tx: Option<oneshot::Sender<()>>,
    errors: Option<mpsc::UnboundedReceiver<SessionError>>,
    stats: Arc<PeerStats>,
}

impl PlayClient {
    /// Connect to the signaling server and start negotiating.
    pub async fn connect(config: PlayConfig) -> Result<Self, Error> {
        config.validate()?;

        let (transport, events) =
            WebSocketTransport::connect(&config.signaling_url, config.outbound_queue_depth).await?;

        let (peer, peer_events) = RtcPeer::new(&config.ice_servers).await?;
        let stats = peer.stats.clone();
        spawn_peer_logger(peer_events);

        Ok(Self::start(&config, Arc::new(peer), stats, transport, events))
    }

    /// Start a session over an already connected channel and peer.
    ///
    /// `stats` are the counters the peer updates for remote media.
    pub fn start<T: ChannelTransport + 'static>(
        config: &PlayConfig,
        peer: Arc<dyn PeerConnectionAdapter>,
        stats: Arc<PeerStats>,
        transport: T,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();

        let session = SignalingSession::new(&config.application_name, &config.stream_name, peer, transport)
            .with_user_data(config.user_data())
            .with_error_sink(errors_tx);

        info!(
            "Starting play session for {}/{}",
            config.application_name, config.stream_name
        );
        let task = tokio::spawn(session.run(events, shutdown_rx));

        Self {
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            errors: Some(errors_rx),
            stats,
        }
    }

    /// Take the receiver for failed session steps (first call only)
    pub fn take_errors(&mut self) -> Option<mpsc::UnboundedReceiver<SessionError>> {
        self.errors.take()
    }

    /// Remote media counters
    pub fn stats(&self) -> &Arc<PeerStats> {
        &self.stats
    }

    /// Whether the session has closed
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait until the session closes on its own.
    ///
    /// Returns the final stream identity.
    pub async fn wait(&mut self) -> Result<Option<StreamIdentity>, Error> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };
        task.await.map_err(|e| Error::Task(e.to_string()))
    }

    /// Tear the session down and wait for it to finish
    pub async fn disconnect(&mut self) -> Result<Option<StreamIdentity>, Error> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.wait().await
    }
}

fn spawn_peer_logger(mut events: mpsc::UnboundedReceiver<PeerEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PeerEvent::LocalCandidate(c) => debug!("Local ICE candidate: {}", c.candidate),
                PeerEvent::GatheringState(s) => info!("ICE gathering state: {}", s),
                PeerEvent::ConnectionState(s) => info!("Connection state: {}", s),
                PeerEvent::Track(mime) => info!("Remote track: {}", mime),
            }
        }
    });
}
