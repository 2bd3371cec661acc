//! Interactive relay client
//!
//! Connects to the relay, prints the assigned identity and then loops:
//! destination ids (comma separated, `-1` for broadcast), then message text.
//! Incoming messages and acknowledgements are printed as they arrive.

use std::env;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use msg_relay::relay_client::{parse_destinations, RelayClient};

/// Default relay address
const DEFAULT_ADDR: &str = "127.0.0.1:8080";

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", text)?;
    stdout.flush()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they do not interleave with the prompt
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("msg_relay=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    let client = RelayClient::connect(&addr).await?;
    let id = client.id();
    println!("Connected to relay with client ID: {}", id);
    info!("Connected to {} as {}", addr, id);

    let (mut sender, mut receiver) = client.split();

    // Print everything the relay sends us
    let recv_task = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(Some(msg)) if msg.is_ack() => println!("\n[ack] {}", msg.text()),
                Ok(Some(msg)) => println!("\nReceived from {}: {}", msg.source_id(), msg.text()),
                Ok(None) => {
                    println!("\nRelay closed connection");
                    break;
                }
                Err(e) => {
                    error!("Receive error: {}", e);
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt("Enter destination IDs separated by commas (-1 for broadcast): ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let destination = match parse_destinations(&line) {
            Ok(destination) => destination,
            Err(e) => {
                println!("Invalid destinations: {}", e);
                continue;
            }
        };

        prompt("Enter message: ")?;
        let Some(text) = lines.next_line().await? else {
            break;
        };

        if let Err(e) = sender.send(&destination, text.trim_end()).await {
            match e {
                msg_relay::AppError::Wire(e) => println!("Cannot send: {}", e),
                e => {
                    error!("Send failed: {}", e);
                    break;
                }
            }
        }

        if recv_task.is_finished() {
            break;
        }
    }

    recv_task.abort();
    Ok(())
}
