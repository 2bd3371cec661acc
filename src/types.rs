//! Basic type definitions for the relay
//!
//! Provides the `ClientId` newtype: the numeric identity the relay assigns
//! to every registered connection and the addressing unit for directed
//! messages.

/// Client identity assigned by the relay (newtype pattern)
///
/// Identity 0 is reserved: it never names a live client and is sent in the
/// handshake to signal that a connection was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Reserved identity meaning "no client"
    pub const UNASSIGNED: ClientId = ClientId(0);

    /// Check whether this identity can name a live client
    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }

    /// Big-endian wire representation
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Parse from the big-endian wire representation
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl From<u32> for ClientId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_identity() {
        assert!(!ClientId::UNASSIGNED.is_assigned());
        assert!(ClientId(1).is_assigned());
        assert_eq!(ClientId::default(), ClientId::UNASSIGNED);
    }

    #[test]
    fn test_wire_bytes_are_big_endian() {
        let id = ClientId(0x0102_0304);
        assert_eq!(id.to_be_bytes(), [1, 2, 3, 4]);
        assert_eq!(ClientId::from_be_bytes([1, 2, 3, 4]), id);
    }

    #[test]
    fn test_display() {
        assert_eq!(ClientId(42).to_string(), "42");
    }
}
