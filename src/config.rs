//! Relay configuration
//!
//! Everything is fixed at startup; there is no configuration file.

use std::net::SocketAddr;

/// Default relay listening address (all interfaces, port 8080)
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default number of registry slots
pub const DEFAULT_CAPACITY: usize = 3;

/// Default per-connection outbound queue length
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// What to do with a frame whose checksum does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptFramePolicy {
    /// Log and discard the frame
    #[default]
    Drop,
    /// Log and relay the frame anyway (best effort under corruption)
    Deliver,
}

/// Relay server settings
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Number of registry slots; connections beyond it are rejected
    pub capacity: usize,
    pub outbound_buffer: usize,
    pub corrupt_frames: CorruptFramePolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            capacity: DEFAULT_CAPACITY,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            corrupt_frames: CorruptFramePolicy::default(),
        }
    }
}
