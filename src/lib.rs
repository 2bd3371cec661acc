//! Fixed-Frame TCP Message Relay Library
//!
//! Clients connect over TCP, receive a numeric identity and exchange
//! fixed-size messages that the relay forwards to one, several or all other
//! connected clients, acknowledging every successful delivery.
//!
//! # Features
//! - CRC-16/CCITT-FALSE protected, length-prefix-free framing
//! - Directed (up to 3 identities) and broadcast routing
//! - One acknowledgement per delivered copy, never for acknowledgements
//! - Fixed-capacity registry with explicit rejection when full
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `RelayServer` is the central actor owning the client registry
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use msg_relay::{serve, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RelayConfig::default();
//!     let listener = TcpListener::bind(config.bind_addr).await.unwrap();
//!     serve(listener, config).await.unwrap();
//! }
//! ```

pub mod checksum;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod relay_client;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use codec::FrameCodec;
pub use config::{CorruptFramePolicy, RelayConfig};
pub use dispatch::{acknowledge, dispatch, DispatchReport};
pub use error::{AppError, ClientError, SendError, WireError};
pub use handler::handle_connection;
pub use message::{Message, RoutingMode};
pub use registry::Registry;
pub use relay_client::{parse_destinations, Destination, RelayClient};
pub use server::{serve, RelayServer, ServerCommand};
pub use types::ClientId;
