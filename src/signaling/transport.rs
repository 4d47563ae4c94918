//! Signaling channel transport.
//!
//! The session only sees [`ChannelTransport`] for outbound frames and a
//! single-consumer queue of [`ChannelEvent`]s for inbound ones. The
//! WebSocket implementation runs one reader and one writer task per
//! connection; the reader is the only producer of events, so delivery is
//! serialized and in arrival order.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError as WsProtocolError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::TransportError;

/// Close code reported when a close frame carried no status
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Inbound channel event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(Bytes),
    Close { code: u16, reason: String },
    Error(String),
}

/// Outbound half of a signaling channel
#[async_trait]
pub trait ChannelTransport: Send {
    /// Queue one frame for delivery
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Close the channel
    async fn close(&mut self);
}

/// WebSocket signaling channel
pub struct WebSocketTransport {
    outbound: mpsc::Sender<Message>,
    writer: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    /// Connect to a WebSocket signaling endpoint.
    ///
    /// Returns the transport and the receiver for its inbound events. The
    /// first event is always [`ChannelEvent::Open`].
    pub async fn connect(
        url: &str,
        queue_depth: usize,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>), TransportError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        info!("Connected to signaling server: {}", url);

        Ok(Self::from_stream(ws_stream, queue_depth))
    }

    /// Wrap an established WebSocket stream
    pub fn from_stream<S>(
        ws_stream: WebSocketStream<S>,
        queue_depth: usize,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<Message>(queue_depth.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel::<ChannelEvent>();

        // Writer
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = ws_sender.send(msg).await {
                    debug!("Signaling writer stopped: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Reader
        tokio::spawn(async move {
            if events_tx.send(ChannelEvent::Open).is_err() {
                return;
            }

            loop {
                let event = match ws_receiver.next().await {
                    Some(Ok(Message::Text(text))) => ChannelEvent::Message(Bytes::from(text.into_bytes())),
                    Some(Ok(Message::Binary(data))) => ChannelEvent::Message(Bytes::from(data)),
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        let _ = events_tx.send(ChannelEvent::Close { code, reason });
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(WsError::Protocol(WsProtocolError::ResetWithoutClosingHandshake)))
                    | Some(Err(WsError::ConnectionClosed))
                    | None => {
                        let _ = events_tx.send(ChannelEvent::Close {
                            code: CLOSE_ABNORMAL,
                            reason: String::new(),
                        });
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Signaling channel error: {}", e);
                        let _ = events_tx.send(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                };

                if events_tx.send(event).is_err() {
                    break;
                }
            }
        });

        (
            Self {
                outbound: tx,
                writer: Some(writer),
            },
            events_rx,
        )
    }
}

#[async_trait]
impl ChannelTransport for WebSocketTransport {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        let text = String::from_utf8(data.to_vec()).map_err(|e| TransportError::Io(e.to_string()))?;
        self.outbound.try_send(Message::Text(text)).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    /// Queue a normal close frame without waiting on the queue.
    ///
    /// A full queue means the writer is stalled; it is aborted instead.
    async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        match self.outbound.try_send(Message::Close(Some(frame))) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Outbound signaling queue full on close, dropping writer");
                if let Some(writer) = self.writer.take() {
                    writer.abort();
                }
            }
        }
    }
}
