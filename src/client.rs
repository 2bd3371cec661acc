//! Client struct definition
//!
//! Represents a registered connection: its identity and the outbound queue
//! feeding that connection's writer task.

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::Message;
use crate::types::ClientId;

/// Registered connection handle
///
/// Holds the identity assigned at registration and the Relay → Client
/// message channel. Writing to the socket happens in the connection's own
/// writer task, so delivering never blocks the caller.
#[derive(Debug, Clone)]
pub struct Client {
    /// Identity assigned by the registry
    pub id: ClientId,
    /// Relay → Client message channel
    pub sender: mpsc::Sender<Message>,
}

impl Client {
    /// Create a new client with the given identity and sender channel
    pub fn new(id: ClientId, sender: mpsc::Sender<Message>) -> Self {
        Self { id, sender }
    }

    /// Queue a message for this client without waiting
    ///
    /// Returns an error if the writer task is gone or its queue is full.
    pub fn deliver(&self, msg: Message) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}
