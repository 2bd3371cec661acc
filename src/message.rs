//! Message protocol definitions
//!
//! The fixed-layout record exchanged between the relay and its clients, and
//! its canonical big-endian encoding. Every message occupies exactly
//! `MESSAGE_LEN` bytes on the wire, which is what lets frames be read off a
//! byte stream without a length prefix.
//!
//! ```text
//! offset  size  field
//!      0     4  source_id (u32)
//!      4     1  routing_mode (0 = directed, 1 = broadcast)
//!      5     1  destination count (0..=3)
//!      6    12  destination ids (3 x u32, unused entries zero)
//!     18     1  is_ack (0 / 1)
//!     19  1024  payload text, NUL padded
//! ```

use crate::error::WireError;
use crate::types::ClientId;

/// Maximum number of destinations a directed message can carry
pub const MAX_DESTINATIONS: usize = 3;

/// Payload capacity in bytes, including the implicit NUL terminator
pub const PAYLOAD_CAPACITY: usize = 1024;

const HEADER_LEN: usize = 4 + 1 + 1 + 4 * MAX_DESTINATIONS + 1;

/// Serialized message length
pub const MESSAGE_LEN: usize = HEADER_LEN + PAYLOAD_CAPACITY;

/// Serialized message length plus checksum trailer
pub const FRAME_LEN: usize = MESSAGE_LEN + crate::checksum::CHECKSUM_LEN;

const MAX_TEXT_LEN: usize = PAYLOAD_CAPACITY - 1;

/// How the relay picks recipients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RoutingMode {
    /// Only the listed destinations
    Directed = 0,
    /// Every registered client except the sender
    Broadcast = 1,
}

impl TryFrom<u8> for RoutingMode {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RoutingMode::Directed),
            1 => Ok(RoutingMode::Broadcast),
            other => Err(WireError::RoutingMode(other)),
        }
    }
}

/// A relay message
///
/// Constructors enforce the destination and payload bounds, so every value
/// of this type encodes to exactly `MESSAGE_LEN` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    source_id: ClientId,
    routing_mode: RoutingMode,
    destinations: Vec<ClientId>,
    is_ack: bool,
    text: String,
}

impl Message {
    /// Create a message for an explicit list of identities
    pub fn directed(
        source_id: ClientId,
        destinations: &[ClientId],
        text: impl Into<String>,
    ) -> Result<Self, WireError> {
        if destinations.len() > MAX_DESTINATIONS {
            return Err(WireError::TooManyDestinations(destinations.len()));
        }
        if destinations.iter().any(|id| !id.is_assigned()) {
            return Err(WireError::UnassignedDestination);
        }
        Ok(Self {
            source_id,
            routing_mode: RoutingMode::Directed,
            destinations: destinations.to_vec(),
            is_ack: false,
            text: checked_text(text.into())?,
        })
    }

    /// Create a message for every other registered client
    pub fn broadcast(source_id: ClientId, text: impl Into<String>) -> Result<Self, WireError> {
        Ok(Self {
            source_id,
            routing_mode: RoutingMode::Broadcast,
            destinations: Vec::new(),
            is_ack: false,
            text: checked_text(text.into())?,
        })
    }

    /// Acknowledgement of one delivery, sent by the relay on behalf of `receiver`
    pub fn ack(receiver: ClientId, original_sender: ClientId) -> Self {
        Self {
            source_id: receiver,
            routing_mode: RoutingMode::Directed,
            destinations: vec![original_sender],
            is_ack: true,
            text: format!("ACK: Message received by {}", receiver),
        }
    }

    pub fn source_id(&self) -> ClientId {
        self.source_id
    }

    /// Replace the source identity
    pub fn set_source_id(&mut self, source_id: ClientId) {
        self.source_id = source_id;
    }

    pub fn routing_mode(&self) -> RoutingMode {
        self.routing_mode
    }

    /// Destination identities (empty for broadcasts)
    pub fn destinations(&self) -> &[ClientId] {
        &self.destinations
    }

    pub fn is_ack(&self) -> bool {
        self.is_ack
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Encode into the canonical fixed-length representation
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; MESSAGE_LEN];
        buf[0..4].copy_from_slice(&self.source_id.to_be_bytes());
        buf[4] = self.routing_mode as u8;
        buf[5] = self.destinations.len() as u8;
        for (i, id) in self.destinations.iter().enumerate() {
            let offset = 6 + i * 4;
            buf[offset..offset + 4].copy_from_slice(&id.to_be_bytes());
        }
        buf[HEADER_LEN - 1] = u8::from(self.is_ack);
        let text = self.text.as_bytes();
        buf[HEADER_LEN..HEADER_LEN + text.len()].copy_from_slice(text);
        buf
    }

    /// Decode from the canonical fixed-length representation
    ///
    /// Payload text ends at the first NUL; invalid UTF-8 is replaced.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() != MESSAGE_LEN {
            return Err(WireError::Length {
                expected: MESSAGE_LEN,
                actual: bytes.len(),
            });
        }

        let source_id = ClientId::from_be_bytes(read_u32(bytes, 0));
        let routing_mode = RoutingMode::try_from(bytes[4])?;

        let count = bytes[5] as usize;
        if count > MAX_DESTINATIONS {
            return Err(WireError::TooManyDestinations(count));
        }
        let destinations: Vec<ClientId> = (0..count)
            .map(|i| ClientId::from_be_bytes(read_u32(bytes, 6 + i * 4)))
            .collect();
        if destinations.iter().any(|id| !id.is_assigned()) {
            return Err(WireError::UnassignedDestination);
        }

        let is_ack = match bytes[HEADER_LEN - 1] {
            0 => false,
            1 => true,
            other => return Err(WireError::AckFlag(other)),
        };

        let payload = &bytes[HEADER_LEN..];
        let end = payload.iter().position(|&b| b == 0).unwrap_or(MAX_TEXT_LEN);
        let mut text = String::from_utf8_lossy(&payload[..end.min(MAX_TEXT_LEN)]).into_owned();
        truncate_at_boundary(&mut text, MAX_TEXT_LEN);

        Ok(Self {
            source_id,
            routing_mode,
            destinations,
            is_ack,
            text,
        })
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

/// Cut at the first NUL (nothing after it survives the wire) and check length
fn checked_text(mut text: String) -> Result<String, WireError> {
    if let Some(nul) = text.find('\0') {
        text.truncate(nul);
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(WireError::PayloadTooLong(text.len()));
    }
    Ok(text)
}

// Lossy decoding can grow the text past capacity
fn truncate_at_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
