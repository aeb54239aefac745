use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::codec::{CodecError, EnginePacket, SocketPacket};
use crate::models::{InboundEvent, OutboundEvent};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),
    #[error("unexpected handshake packet: {0}")]
    Handshake(String),
    #[error("relay refused the connection: {0}")]
    Rejected(String),
    #[error("relay closed the connection")]
    Closed,
    #[error("relay handshake timed out")]
    Timeout,
}

#[derive(Debug)]
pub enum RelayCommand {
    Emit(OutboundEvent),
    Disconnect,
}

/// Sending half of a relay connection.
///
/// Emitting never fails loudly: once the connection is gone events are
/// dropped, there is no queue and no reconnect.
#[derive(Debug, Clone)]
pub struct RelayLink {
    tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayLink {
    pub fn new(tx: mpsc::UnboundedSender<RelayCommand>) -> Self {
        Self { tx }
    }

    /// A link that drops everything, for sessions without a relay
    pub fn offline() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Returns false when the event was dropped
    pub fn emit(&self, event: OutboundEvent) -> bool {
        let name = event.name();
        let sent = self.tx.send(RelayCommand::Emit(event)).is_ok();
        if !sent {
            debug!("Relay not connected, dropping {}", name);
        }
        sent
    }

    pub fn disconnect(&self) {
        let _ = self.tx.send(RelayCommand::Disconnect);
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// An established relay connection
pub struct RelayConnection {
    pub link: RelayLink,
    pub events: mpsc::UnboundedReceiver<InboundEvent>,
    pub task: JoinHandle<()>,
}

/// Connect to the relay and complete the Socket.IO handshake
pub async fn connect(url: &str) -> Result<RelayConnection, RelayError> {
    let ws = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(url))
        .await
        .map_err(|_| RelayError::Timeout)??;
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(drive(ws, cmd_rx, event_tx));

    Ok(RelayConnection {
        link: RelayLink::new(cmd_tx),
        events: event_rx,
        task,
    })
}

async fn handshake(url: &str) -> Result<WsStream, RelayError> {
    let (mut ws, _) = connect_async(url).await?;

    let open = match next_packet(&mut ws).await? {
        EnginePacket::Open(open) => open,
        other => return Err(RelayError::Handshake(format!("{:?}", other))),
    };
    debug!("Engine session {} opened (ping every {} ms)", open.sid, open.ping_interval);

    send_packet(&mut ws, &EnginePacket::Message(SocketPacket::Connect(None))).await?;
    loop {
        match next_packet(&mut ws).await? {
            EnginePacket::Message(SocketPacket::Connect(_)) => break,
            EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                return Err(RelayError::Rejected(reason.to_string()))
            }
            EnginePacket::Ping => send_packet(&mut ws, &EnginePacket::Pong).await?,
            EnginePacket::Noop => {}
            other => return Err(RelayError::Handshake(format!("{:?}", other))),
        }
    }

    info!("Connected to relay at {}", url);
    Ok(ws)
}

async fn next_packet(ws: &mut WsStream) -> Result<EnginePacket, RelayError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(text.as_str())?),
            Some(Ok(Message::Close(_))) | None => return Err(RelayError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn send_packet(ws: &mut WsStream, packet: &EnginePacket) -> Result<(), RelayError> {
    ws.send(Message::Text(packet.encode().into())).await?;
    Ok(())
}

// Pump commands out and events in until either side goes away
async fn drive(
    ws: WsStream,
    mut commands: mpsc::UnboundedReceiver<RelayCommand>,
    events: mpsc::UnboundedSender<InboundEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(RelayCommand::Emit(event)) => {
                    let frame = EnginePacket::from(&event).encode();
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        warn!("Failed to send {} to relay: {}", event.name(), e);
                        break;
                    }
                }
                Some(RelayCommand::Disconnect) | None => {
                    let bye = EnginePacket::Message(SocketPacket::Disconnect).encode();
                    let _ = sink.send(Message::Text(bye.into())).await;
                    let _ = sink.close().await;
                    debug!("Disconnected from relay");
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match EnginePacket::decode(text.as_str()) {
                    Ok(EnginePacket::Ping) => {
                        if sink.send(Message::Text(EnginePacket::Pong.encode().into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(EnginePacket::Message(SocketPacket::Event { name, payload })) => {
                        if events.send(InboundEvent::from_event(&name, payload)).is_err() {
                            break;
                        }
                    }
                    Ok(EnginePacket::Close) | Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
                        info!("Relay ended the session");
                        break;
                    }
                    Ok(other) => debug!("Ignoring relay packet {:?}", other),
                    Err(e) => debug!("Dropping undecodable relay frame: {}", e),
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Relay connection closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Relay connection error: {}", e);
                    break;
                }
            },
        }
    }
}
