//! Message Relay - Entry Point
//!
//! Binds the listening socket and runs the relay accept loop.

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use msg_relay::{serve, RelayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=msg_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("msg_relay=info")),
        )
        .init();

    let mut config = RelayConfig::default();

    // Optional bind address override, e.g. 127.0.0.1:9000
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr.parse::<SocketAddr>()?;
    }

    let listener = TcpListener::bind(config.bind_addr).await?;
    serve(listener, config).await?;

    Ok(())
}
