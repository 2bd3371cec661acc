//! Client registry
//!
//! Fixed-capacity slot table mapping each registered connection to its
//! identity. The registry is owned by the relay actor, so every operation
//! here runs with exclusive access and none of them touches a socket.

use tokio::sync::mpsc;
use tracing::debug;

use crate::client::Client;
use crate::error::AppError;
use crate::message::{Message, RoutingMode};
use crate::types::ClientId;

/// Pre-allocated table of client slots
///
/// Identities come from a counter that starts at 1 and only moves forward.
/// After wrapping it skips 0 and any identity still held by a slot.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<Option<Client>>,
    next_id: u32,
}

impl Registry {
    /// Create a registry with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_id: 1,
        }
    }

    /// Claim a free slot for a connection and assign its identity
    ///
    /// Fails with `CapacityExceeded` without touching any slot when all
    /// slots are occupied.
    pub fn register(&mut self, sender: mpsc::Sender<Message>) -> Result<ClientId, AppError> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(AppError::CapacityExceeded);
        };

        let id = self.next_identity();
        self.slots[index] = Some(Client::new(id, sender));
        debug!("Slot {} assigned to client {}", index, id);
        Ok(id)
    }

    /// Free the slot held by `id`
    ///
    /// Returns the removed client, or `None` if no slot held it.
    pub fn unregister(&mut self, id: ClientId) -> Option<Client> {
        let slot = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|c| c.id == id))?;
        slot.take()
    }

    /// Resolve the recipients of a message from `origin`
    ///
    /// Returns occupied slots other than the origin, in slot order: every one
    /// for a broadcast, otherwise those whose identity is listed. Listed
    /// identities with no slot are skipped.
    pub fn resolve_targets(
        &self,
        origin: ClientId,
        routing_mode: RoutingMode,
        destinations: &[ClientId],
    ) -> Vec<&Client> {
        self.occupied()
            .filter(|client| client.id != origin)
            .filter(|client| match routing_mode {
                RoutingMode::Broadcast => true,
                RoutingMode::Directed => destinations.contains(&client.id),
            })
            .collect()
    }

    /// Look up a registered client
    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.occupied().find(|client| client.id == id)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.occupied().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn occupied(&self) -> impl Iterator<Item = &Client> {
        self.slots.iter().flatten()
    }

    fn next_identity(&mut self) -> ClientId {
        loop {
            let candidate = ClientId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if candidate.is_assigned() && self.get(candidate).is_none() {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> mpsc::Sender<Message> {
        mpsc::channel(1).0
    }

    #[test]
    fn test_register_assigns_increasing_identities() {
        let mut registry = Registry::new(3);
        let ids: Vec<_> = (0..3).map(|_| registry.register(sender()).unwrap()).collect();

        assert_eq!(ids, vec![ClientId(1), ClientId(2), ClientId(3)]);
        assert_eq!(registry.len(), registry.capacity());
    }

    #[test]
    fn test_capacity_exceeded_leaves_slots_untouched() {
        let mut registry = Registry::new(2);
        registry.register(sender()).unwrap();
        registry.register(sender()).unwrap();

        let err = registry.register(sender()).unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded));
        assert!(registry.get(ClientId(1)).is_some());
        assert!(registry.get(ClientId(2)).is_some());
        assert_eq!(registry.len(), 2);

        // The failed attempt did not consume an identity
        registry.unregister(ClientId(1));
        assert_eq!(registry.register(sender()).unwrap(), ClientId(3));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = Registry::new(2);
        let id = registry.register(sender()).unwrap();

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_freed_slot_gets_fresh_identity() {
        let mut registry = Registry::new(1);
        let first = registry.register(sender()).unwrap();
        registry.unregister(first);
        let second = registry.register(sender()).unwrap();

        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
    }

    #[test]
    fn test_resolve_broadcast_excludes_origin() {
        let mut registry = Registry::new(3);
        let a = registry.register(sender()).unwrap();
        let b = registry.register(sender()).unwrap();
        let c = registry.register(sender()).unwrap();

        let targets: Vec<_> = registry
            .resolve_targets(a, RoutingMode::Broadcast, &[])
            .into_iter()
            .map(|client| client.id)
            .collect();
        assert_eq!(targets, vec![b, c]);
    }

    #[test]
    fn test_resolve_directed_in_slot_order() {
        let mut registry = Registry::new(3);
        let a = registry.register(sender()).unwrap();
        let b = registry.register(sender()).unwrap();
        let c = registry.register(sender()).unwrap();

        let targets: Vec<_> = registry
            .resolve_targets(a, RoutingMode::Directed, &[c, ClientId(999), b, a])
            .into_iter()
            .map(|client| client.id)
            .collect();
        assert_eq!(targets, vec![b, c]);
    }

    #[test]
    fn test_resolve_skips_unregistered() {
        let mut registry = Registry::new(3);
        let a = registry.register(sender()).unwrap();
        let b = registry.register(sender()).unwrap();
        registry.unregister(b);

        assert!(registry
            .resolve_targets(a, RoutingMode::Directed, &[b])
            .is_empty());
        assert!(registry
            .resolve_targets(a, RoutingMode::Broadcast, &[])
            .is_empty());
    }

    #[test]
    fn test_identity_counter_wraps_past_zero_and_live_ids() {
        let mut registry = Registry::new(2);
        registry.next_id = 1;
        let kept = registry.register(sender()).unwrap();
        assert_eq!(kept, ClientId(1));

        registry.next_id = u32::MAX;
        let last = registry.register(sender()).unwrap();
        assert_eq!(last, ClientId(u32::MAX));
        registry.unregister(last);

        // 0 is reserved and 1 is still live
        let wrapped = registry.register(sender()).unwrap();
        assert_eq!(wrapped, ClientId(2));
    }
}
