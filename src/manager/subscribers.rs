//! Change notification subscribers

use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::protocol::{ClientContext, ConnectionId};

/// Connections that asked to be told about changes
#[derive(Debug, Default)]
pub struct Subscribers {
    clients: HashMap<ConnectionId, mpsc::Sender<Bytes>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; re-subscribing is a no-op
    pub fn subscribe(&mut self, client: &ClientContext) {
        self.clients
            .entry(client.connection_id)
            .or_insert_with(|| client.notifier.clone());
    }

    /// Remove a connection; returns whether it was subscribed
    pub fn unsubscribe(&mut self, connection_id: ConnectionId) -> bool {
        self.clients.remove(&connection_id).is_some()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.clients.contains_key(&connection_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Send `message` to every subscriber
    ///
    /// Never waits: a subscriber whose queue is full misses this message.
    /// Connections whose receiving end is gone are dropped from the set.
    /// Returns the number of subscribers left.
    pub fn notify(&mut self, message: &Bytes) -> usize {
        self.clients
            .retain(|id, tx| match tx.try_send(message.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::trace!(connection = id, "Subscriber queue full, event dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(connection = id, "Dropping closed subscriber");
                    false
                }
            });
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NOTIFY_QUEUE;

    #[test]
    fn test_subscribe_notify_unsubscribe() {
        let mut subscribers = Subscribers::new();
        let (a, mut a_rx) = ClientContext::new(1);
        let (b, mut b_rx) = ClientContext::new(2);

        subscribers.subscribe(&a);
        subscribers.subscribe(&a);
        subscribers.subscribe(&b);
        assert_eq!(subscribers.len(), 2);

        let message = Bytes::from_static(b"changed");
        assert_eq!(subscribers.notify(&message), 2);
        assert_eq!(a_rx.try_recv().unwrap(), message);
        assert_eq!(b_rx.try_recv().unwrap(), message);
        assert!(a_rx.try_recv().is_err());

        assert!(subscribers.unsubscribe(1));
        assert!(!subscribers.unsubscribe(1));
        subscribers.notify(&message);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_ok());
    }

    #[test]
    fn test_closed_receivers_are_dropped() {
        let mut subscribers = Subscribers::new();
        let (a, a_rx) = ClientContext::new(1);
        subscribers.subscribe(&a);
        drop(a_rx);

        assert_eq!(subscribers.notify(&Bytes::from_static(b"x")), 0);
        assert!(!subscribers.contains(1));
    }

    #[test]
    fn test_slow_reader_queue_is_bounded() {
        let mut subscribers = Subscribers::new();
        let (a, mut a_rx) = ClientContext::new(1);
        subscribers.subscribe(&a);

        let message = Bytes::from_static(b"changed");
        for _ in 0..NOTIFY_QUEUE * 4 {
            assert_eq!(subscribers.notify(&message), 1);
        }
        assert!(subscribers.contains(1));

        let mut queued = 0;
        while a_rx.try_recv().is_ok() {
            queued += 1;
        }
        assert_eq!(queued, NOTIFY_QUEUE);

        // Draining makes room again
        subscribers.notify(&message);
        assert!(a_rx.try_recv().is_ok());
    }
}
