//! Connection session handler
//!
//! Drives one client through `Connecting → Registered → Receiving → Closed`:
//! registration with the RelayServer, the identity handshake, the frame
//! receive loop and deregistration.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{handshake_frame, FrameCodec, InboundFrame};
use crate::config::{CorruptFramePolicy, RelayConfig};
use crate::error::AppError;
use crate::message::Message;
use crate::server::ServerCommand;
use crate::types::ClientId;

/// Lifecycle of a connection session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport is up, no registry slot yet
    Connecting,
    /// Identity assigned and sent to the peer
    Registered,
    /// Reading frames and relaying them
    Receiving,
    /// Terminal
    Closed,
}

impl SessionState {
    /// Check whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Registered)
                | (Connecting, Closed)
                | (Registered, Receiving)
                | (Registered, Closed)
                | (Receiving, Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Registered => "registered",
            SessionState::Receiving => "receiving",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

fn transition(peer_addr: SocketAddr, state: &mut SessionState, next: SessionState) {
    debug_assert!(state.can_transition_to(next), "{} -> {}", state, next);
    debug!("Session {}: {} -> {}", peer_addr, state, next);
    *state = next;
}

/// Handle a new connection
///
/// Registers with the RelayServer, sends the identity handshake and then
/// relays frames until the peer disconnects. A full registry is answered
/// with the reserved identity before the connection is closed.
pub async fn handle_connection<S>(
    stream: S,
    peer_addr: SocketAddr,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: RelayConfig,
) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut state = SessionState::Connecting;
    let (reader, mut writer) = tokio::io::split(stream);

    // Create channel for relay -> client messages
    let (msg_tx, msg_rx) = mpsc::channel::<Message>(config.outbound_buffer);

    // Register with RelayServer
    let (reply_tx, reply_rx) = oneshot::channel();
    if cmd_tx
        .send(ServerCommand::Connect {
            sender: msg_tx,
            reply: reply_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register {} - server closed", peer_addr);
        return Err(AppError::ChannelSend);
    }
    let client_id = match reply_rx.await.map_err(|_| AppError::ChannelSend)? {
        Ok(client_id) => client_id,
        Err(e) => {
            warn!("Rejecting {}: {}", peer_addr, e);
            if let Err(write_err) = writer.write_all(&handshake_frame(ClientId::UNASSIGNED)).await {
                debug!("Rejection frame to {} not written: {}", peer_addr, write_err);
            }
            if let Err(shutdown_err) = writer.shutdown().await {
                debug!("Shutdown of {} failed: {}", peer_addr, shutdown_err);
            }
            transition(peer_addr, &mut state, SessionState::Closed);
            return Err(e);
        }
    };

    // Send assigned identity before any relay traffic
    if let Err(e) = writer.write_all(&handshake_frame(client_id)).await {
        let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;
        transition(peer_addr, &mut state, SessionState::Closed);
        return Err(e.into());
    }
    transition(peer_addr, &mut state, SessionState::Registered);
    info!("Client {} connected from {}", client_id, peer_addr);

    transition(peer_addr, &mut state, SessionState::Receiving);

    // Clone cmd_tx for read and write tasks
    let cmd_tx_read = cmd_tx.clone();
    let cmd_tx_write = cmd_tx.clone();
    let policy = config.corrupt_frames;

    // Spawn read task (frames -> ServerCommand)
    let mut read_task = tokio::spawn(async move {
        let mut frames = FramedRead::new(reader, FrameCodec);
        while let Some(result) = frames.next().await {
            match result {
                Ok(frame) => {
                    let Some(message) = accept_frame(client_id, frame, policy) else {
                        continue;
                    };
                    if cmd_tx_read
                        .send(ServerCommand::Relay { client_id, message })
                        .await
                        .is_err()
                    {
                        debug!("Server closed, ending read task for {}", client_id);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Read error for {}: {}", client_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", client_id);
    });

    // Spawn write task (Message -> frames). A message only counts as
    // delivered once its frame has been flushed to the connection.
    let mut write_task = tokio::spawn(async move {
        let mut frames = FramedWrite::new(writer, FrameCodec);
        let mut msg_rx = msg_rx;
        while let Some(msg) = msg_rx.recv().await {
            let delivered = (!msg.is_ack()).then(|| msg.clone());
            if let Err(e) = frames.send(msg).await {
                debug!("Write failed for {}: {}", client_id, e);
                break;
            }
            if let Some(message) = delivered {
                if cmd_tx_write
                    .send(ServerCommand::Delivered { client_id, message })
                    .await
                    .is_err()
                {
                    debug!("Server closed, ending write task for {}", client_id);
                    break;
                }
            }
        }
        debug!("Write task ended for {}", client_id);

        let _ = frames.close().await;
    });

    // Wait for either task to complete, then stop the other
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", client_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", client_id);
            read_task.abort();
        }
    }

    // Send disconnect command
    let _ = cmd_tx.send(ServerCommand::Disconnect { client_id }).await;
    transition(peer_addr, &mut state, SessionState::Closed);

    info!("Client {} disconnected", client_id);

    Ok(())
}

/// Turn a received frame into a message to relay, or drop it
///
/// Applies the corrupt frame policy, drops frames that do not decode and
/// stamps the session's identity as the message source.
pub fn accept_frame(
    client_id: ClientId,
    frame: InboundFrame,
    policy: CorruptFramePolicy,
) -> Option<Message> {
    if !frame.checksum_ok {
        warn!(
            "Corrupted frame from {}: received CRC {:04X}, computed {:04X}",
            client_id, frame.received_checksum, frame.computed_checksum
        );
        if policy == CorruptFramePolicy::Drop {
            return None;
        }
    }

    let mut message = match frame.message {
        Ok(message) => message,
        Err(e) => {
            warn!("Malformed frame from {}: {}", client_id, e);
            return None;
        }
    };

    if message.source_id() != client_id {
        debug!(
            "Client {} sent source id {}, overriding",
            client_id,
            message.source_id()
        );
        message.set_source_id(client_id);
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WireError;

    fn frame(checksum_ok: bool, message: Result<Message, WireError>) -> InboundFrame {
        InboundFrame {
            checksum_ok,
            received_checksum: 0x1234,
            computed_checksum: if checksum_ok { 0x1234 } else { 0x4321 },
            message,
        }
    }

    #[test]
    fn test_state_transitions() {
        use SessionState::*;
        assert!(Connecting.can_transition_to(Registered));
        assert!(Connecting.can_transition_to(Closed));
        assert!(Registered.can_transition_to(Receiving));
        assert!(Receiving.can_transition_to(Closed));
        assert!(!Connecting.can_transition_to(Receiving));
        assert!(!Closed.can_transition_to(Connecting));
        assert!(!Receiving.can_transition_to(Registered));
    }

    #[test]
    fn test_accept_frame_stamps_source() {
        let msg = Message::broadcast(ClientId(99), "spoofed").unwrap();
        let accepted = accept_frame(ClientId(2), frame(true, Ok(msg)), CorruptFramePolicy::Drop);
        assert_eq!(accepted.unwrap().source_id(), ClientId(2));
    }

    #[test]
    fn test_accept_frame_corruption_policy() {
        let msg = Message::broadcast(ClientId(1), "noisy").unwrap();

        let dropped = accept_frame(
            ClientId(1),
            frame(false, Ok(msg.clone())),
            CorruptFramePolicy::Drop,
        );
        assert!(dropped.is_none());

        let delivered = accept_frame(
            ClientId(1),
            frame(false, Ok(msg.clone())),
            CorruptFramePolicy::Deliver,
        );
        assert_eq!(delivered, Some(msg));
    }

    #[test]
    fn test_accept_frame_drops_malformed() {
        let accepted = accept_frame(
            ClientId(1),
            frame(true, Err(WireError::RoutingMode(7))),
            CorruptFramePolicy::Deliver,
        );
        assert!(accepted.is_none());
    }
}
