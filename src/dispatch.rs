//! Dispatch engine
//!
//! Decides who receives an inbound message and hands a copy to each
//! recipient's writer. Acknowledgements are generated separately by
//! `acknowledge`, once a recipient's writer has actually put the frame on
//! its connection.

use tracing::{debug, warn};

use crate::error::SendError;
use crate::message::Message;
use crate::registry::Registry;
use crate::types::ClientId;

/// A delivery attempt that did not reach its target's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub target: ClientId,
    pub error: SendError,
}

/// Outcome of one dispatch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Recipients whose queue accepted the message, in slot order
    pub delivered: Vec<ClientId>,
    /// Recipients that could not be reached
    pub failed: Vec<DeliveryFailure>,
}

impl DispatchReport {
    /// Targets whose connection is gone and should be unregistered
    pub fn closed_targets(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.failed
            .iter()
            .filter(|f| f.error == SendError::ChannelClosed)
            .map(|f| f.target)
    }
}

/// Relay `message` from `origin` to its recipients
///
/// Each target is attempted independently: a failed delivery is recorded
/// and the remaining targets are still tried.
pub fn dispatch(registry: &Registry, origin: ClientId, message: &Message) -> DispatchReport {
    let mut report = DispatchReport::default();

    let targets = registry.resolve_targets(origin, message.routing_mode(), message.destinations());
    if targets.is_empty() {
        debug!("Message from {} matched no recipients", origin);
    }

    for target in targets {
        match target.deliver(message.clone()) {
            Ok(()) => report.delivered.push(target.id),
            Err(error) => {
                warn!("Delivery from {} to {} failed: {}", origin, target.id, error);
                report.failed.push(DeliveryFailure {
                    target: target.id,
                    error,
                });
            }
        }
    }

    report
}

/// Acknowledge that `receiver`'s connection was written `delivered`
///
/// Queues `"ACK: Message received by <receiver>"` to the original sender.
/// Returns false when nothing was sent: the delivered message was itself an
/// acknowledgement, the sender is gone, or its queue refused the ACK.
pub fn acknowledge(registry: &Registry, receiver: ClientId, delivered: &Message) -> bool {
    if delivered.is_ack() {
        return false;
    }

    let origin = delivered.source_id();
    let Some(origin_client) = registry.get(origin) else {
        debug!("ACK for {} dropped: sender {} is gone", receiver, origin);
        return false;
    };

    match origin_client.deliver(Message::ack(receiver, origin)) {
        Ok(()) => true,
        Err(e) => {
            debug!("ACK for {} to {} dropped: {}", receiver, origin, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RoutingMode;
    use tokio::sync::mpsc;

    struct Peer {
        id: ClientId,
        rx: mpsc::Receiver<Message>,
    }

    fn join(registry: &mut Registry) -> Peer {
        let (tx, rx) = mpsc::channel(16);
        let id = registry.register(tx).unwrap();
        Peer { id, rx }
    }

    fn drain(peer: &mut Peer) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = peer.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_broadcast_fan_out() {
        let mut registry = Registry::new(3);
        let mut a = join(&mut registry);
        let mut b = join(&mut registry);
        let mut c = join(&mut registry);

        let msg = Message::broadcast(a.id, "hello all").unwrap();
        let report = dispatch(&registry, a.id, &msg);

        assert_eq!(report.delivered, vec![b.id, c.id]);
        assert!(report.failed.is_empty());

        assert_eq!(drain(&mut b), vec![msg.clone()]);
        assert_eq!(drain(&mut c), vec![msg]);
        // Queuing alone never acknowledges
        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_directed_with_unknown_target() {
        let mut registry = Registry::new(3);
        let a = join(&mut registry);
        let mut b = join(&mut registry);
        let mut c = join(&mut registry);

        let msg = Message::directed(a.id, &[b.id, ClientId(999)], "just b").unwrap();
        let report = dispatch(&registry, a.id, &msg);

        assert_eq!(report.delivered, vec![b.id]);
        assert_eq!(drain(&mut b), vec![msg]);
        assert!(drain(&mut c).is_empty());
    }

    #[test]
    fn test_never_delivers_to_origin() {
        let mut registry = Registry::new(2);
        let mut a = join(&mut registry);
        let _b = join(&mut registry);

        let msg = Message::directed(a.id, &[a.id], "to myself").unwrap();
        let report = dispatch(&registry, a.id, &msg);

        assert!(report.delivered.is_empty());
        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_failed_target_does_not_abort_dispatch() {
        let mut registry = Registry::new(3);
        let a = join(&mut registry);
        let b = join(&mut registry);
        let mut c = join(&mut registry);
        let b_id = b.id;
        drop(b);

        let msg = Message::broadcast(a.id, "anyone there").unwrap();
        let report = dispatch(&registry, a.id, &msg);

        assert_eq!(report.delivered, vec![c.id]);
        assert_eq!(
            report.failed,
            vec![DeliveryFailure {
                target: b_id,
                error: SendError::ChannelClosed,
            }]
        );
        assert_eq!(report.closed_targets().collect::<Vec<_>>(), vec![b_id]);
        assert_eq!(drain(&mut c), vec![msg]);
    }

    #[test]
    fn test_full_target_is_not_closed() {
        let mut registry = Registry::new(2);
        let a = join(&mut registry);
        let (tx, _rx) = mpsc::channel(1);
        let slow = registry.register(tx).unwrap();

        let msg = Message::broadcast(a.id, "first").unwrap();
        dispatch(&registry, a.id, &msg);
        let report = dispatch(&registry, a.id, &msg);

        assert_eq!(report.failed[0].target, slow);
        assert_eq!(report.failed[0].error, SendError::ChannelFull);
        assert_eq!(report.closed_targets().count(), 0);
    }

    #[test]
    fn test_acknowledge_names_receiver() {
        let mut registry = Registry::new(3);
        let mut a = join(&mut registry);
        let b = join(&mut registry);
        let c = join(&mut registry);

        let msg = Message::broadcast(a.id, "hello all").unwrap();
        assert!(acknowledge(&registry, b.id, &msg));
        assert!(acknowledge(&registry, c.id, &msg));

        let acks = drain(&mut a);
        assert_eq!(acks, vec![Message::ack(b.id, a.id), Message::ack(c.id, a.id)]);
        assert_eq!(acks[0].text(), format!("ACK: Message received by {}", b.id));
        assert!(acks.iter().all(|ack| ack.is_ack()
            && ack.routing_mode() == RoutingMode::Directed
            && ack.destinations() == [a.id]));
    }

    #[test]
    fn test_acknowledge_suppressed_for_acks() {
        let mut registry = Registry::new(2);
        let mut a = join(&mut registry);
        let b = join(&mut registry);

        let ack = Message::ack(b.id, a.id);
        assert!(!acknowledge(&registry, a.id, &ack));
        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_acknowledge_to_departed_sender() {
        let mut registry = Registry::new(2);
        let a = join(&mut registry);
        let b = join(&mut registry);
        registry.unregister(a.id);

        let msg = Message::directed(a.id, &[b.id], "late").unwrap();
        assert!(!acknowledge(&registry, b.id, &msg));
    }
}
