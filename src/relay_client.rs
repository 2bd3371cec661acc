//! Client side of the relay protocol
//!
//! `RelayClient` performs the identity handshake and then exchanges
//! fixed-size frames with the relay. `parse_destinations` turns the
//! interactive "destination ids" prompt into a routing decision.

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::codec::{read_handshake, FrameCodec};
use crate::error::{AppError, ClientError, WireError};
use crate::message::{Message, MAX_DESTINATIONS};
use crate::types::ClientId;

/// Destination token meaning "everyone else"
pub const BROADCAST_SENTINEL: i64 = -1;

/// Where a message typed at the prompt should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Broadcast,
    Clients(Vec<ClientId>),
}

impl Destination {
    /// Build the message for this destination
    pub fn to_message(&self, source_id: ClientId, text: &str) -> Result<Message, WireError> {
        match self {
            Destination::Broadcast => Message::broadcast(source_id, text),
            Destination::Clients(ids) => Message::directed(source_id, ids, text),
        }
    }
}

/// Parse a comma separated destination list
///
/// `-1` on its own selects broadcast. The decision is made from this input
/// alone, never from a previously built message.
pub fn parse_destinations(input: &str) -> Result<Destination, ClientError> {
    let tokens: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(ClientError::Empty);
    }

    let values = tokens
        .iter()
        .map(|t| {
            t.parse::<i64>()
                .map_err(|_| ClientError::InvalidNumber(t.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.contains(&BROADCAST_SENTINEL) {
        if values.len() > 1 {
            return Err(ClientError::MixedBroadcast);
        }
        return Ok(Destination::Broadcast);
    }

    if values.len() > MAX_DESTINATIONS {
        return Err(ClientError::TooManyDestinations(values.len()));
    }

    let ids = values
        .into_iter()
        .map(|v| match u32::try_from(v) {
            Ok(id) if id != 0 => Ok(ClientId(id)),
            _ => Err(ClientError::InvalidIdentity(v)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Destination::Clients(ids))
}

/// A connected, registered relay client
pub struct RelayClient {
    id: ClientId,
    sender: RelaySender,
    receiver: RelayReceiver,
}

impl RelayClient {
    /// Connect and wait for the relay to assign an identity
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, AppError> {
        let stream = TcpStream::connect(addr).await?;
        let (mut read_half, write_half) = stream.into_split();

        let id = read_handshake(&mut read_half).await?;
        debug!("Relay assigned identity {}", id);

        Ok(Self {
            id,
            sender: RelaySender {
                id,
                frames: FramedWrite::new(write_half, FrameCodec),
            },
            receiver: RelayReceiver {
                frames: FramedRead::new(read_half, FrameCodec),
            },
        })
    }

    /// Identity assigned by the relay
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub async fn send(&mut self, destination: &Destination, text: &str) -> Result<(), AppError> {
        self.sender.send(destination, text).await
    }

    pub async fn recv(&mut self) -> Result<Option<Message>, AppError> {
        self.receiver.recv().await
    }

    /// Split into independently usable halves
    pub fn split(self) -> (RelaySender, RelayReceiver) {
        (self.sender, self.receiver)
    }
}

/// Sending half of a `RelayClient`
pub struct RelaySender {
    id: ClientId,
    frames: FramedWrite<OwnedWriteHalf, FrameCodec>,
}

impl RelaySender {
    /// Build and send a message from this client
    pub async fn send(&mut self, destination: &Destination, text: &str) -> Result<(), AppError> {
        let message = destination.to_message(self.id, text)?;
        self.send_message(message).await
    }

    /// Send a prebuilt message as is
    pub async fn send_message(&mut self, message: Message) -> Result<(), AppError> {
        self.frames.send(message).await
    }
}

/// Receiving half of a `RelayClient`
pub struct RelayReceiver {
    frames: FramedRead<OwnedReadHalf, FrameCodec>,
}

impl RelayReceiver {
    /// Wait for the next valid message; `None` once the relay hangs up
    ///
    /// Frames that fail their checksum or do not decode are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<Message>, AppError> {
        while let Some(frame) = self.frames.next().await {
            let frame = frame?;
            if !frame.checksum_ok {
                warn!(
                    "Corrupted frame from relay: received CRC {:04X}, computed {:04X}",
                    frame.received_checksum, frame.computed_checksum
                );
                continue;
            }
            match frame.message {
                Ok(message) => return Ok(Some(message)),
                Err(e) => warn!("Malformed frame from relay: {}", e),
            }
        }
        Ok(None)
    }
}
