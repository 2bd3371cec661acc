//! RelayServer Actor implementation
//!
//! The central actor that owns the client registry. Connection handlers
//! register, relay and unregister by sending it commands over an mpsc
//! channel, so every registry operation runs on this one task and no lock
//! is needed.

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::dispatch::{acknowledge, dispatch};
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::message::Message;
use crate::registry::Registry;
use crate::types::ClientId;

/// Channel buffer size for server commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from handlers to the RelayServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection asks for a slot
    Connect {
        sender: mpsc::Sender<Message>,
        reply: oneshot::Sender<Result<ClientId, AppError>>,
    },
    /// Connection ended
    Disconnect { client_id: ClientId },
    /// Inbound message to relay
    Relay {
        client_id: ClientId,
        message: Message,
    },
    /// A relayed message was written to this client's connection
    Delivered {
        client_id: ClientId,
        message: Message,
    },
}

/// The main RelayServer actor
pub struct RelayServer {
    registry: Registry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl RelayServer {
    /// Create a new RelayServer with `capacity` slots
    pub fn new(capacity: usize, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            registry: Registry::new(capacity),
            receiver,
        }
    }

    /// Run the RelayServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("RelayServer started with {} slots", self.registry.capacity());

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("RelayServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { sender, reply } => {
                self.handle_connect(sender, reply);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Relay { client_id, message } => {
                self.handle_relay(client_id, message);
            }
            ServerCommand::Delivered { client_id, message } => {
                self.handle_delivered(client_id, message);
            }
        }
    }

    fn handle_connect(
        &mut self,
        sender: mpsc::Sender<Message>,
        reply: oneshot::Sender<Result<ClientId, AppError>>,
    ) {
        let result = self.registry.register(sender);
        match &result {
            Ok(client_id) => info!("Client {} registered", client_id),
            Err(e) => warn!("Registration refused: {}", e),
        }

        // Handler gave up waiting; release the slot we just claimed
        if let Err(Ok(client_id)) = reply.send(result) {
            self.registry.unregister(client_id);
        }

        debug!(
            "Registered clients: {}/{}",
            self.registry.len(),
            self.registry.capacity()
        );
    }

    fn handle_disconnect(&mut self, client_id: ClientId) {
        if self.registry.unregister(client_id).is_some() {
            info!("Client {} unregistered", client_id);
        }
        debug!(
            "Registered clients: {}/{}",
            self.registry.len(),
            self.registry.capacity()
        );
    }

    fn handle_relay(&mut self, client_id: ClientId, message: Message) {
        // Commands can trail a disconnect eviction; never relay for a freed slot
        if self.registry.get(client_id).is_none() {
            debug!("Dropping message from unregistered client {}", client_id);
            return;
        }

        let report = dispatch(&self.registry, client_id, &message);
        debug!(
            "Message from {} queued for {:?}",
            client_id, report.delivered
        );

        for target in report.closed_targets() {
            if self.registry.unregister(target).is_some() {
                info!("Client {} unregistered after failed delivery", target);
            }
        }
    }

    fn handle_delivered(&mut self, client_id: ClientId, message: Message) {
        if acknowledge(&self.registry, client_id, &message) {
            debug!("ACK for {} sent to {}", client_id, message.source_id());
        }
    }
}

/// Accept connections on `listener` until it fails
///
/// Spawns the RelayServer actor plus one handler task per connection.
pub async fn serve(listener: TcpListener, config: RelayConfig) -> Result<(), AppError> {
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tokio::spawn(RelayServer::new(config.capacity, cmd_rx).run());

    info!("Relay listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, cmd_tx, config).await {
                        error!("Connection handler error for {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
