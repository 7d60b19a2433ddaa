//! Client context
//!
//! Identifies the remote connection a request arrived on and carries the
//! channel unsolicited messages are pushed to.

use bytes::Bytes;
use tokio::sync::mpsc;

/// Change notifications buffered per connection before new ones are dropped
///
/// Notifications carry no payload beyond "something changed", so a reader
/// that falls behind loses nothing by missing duplicates.
pub const NOTIFY_QUEUE: usize = 16;

/// Unique connection identifier assigned by the transport
pub type ConnectionId = u64;

/// Context passed along with every extension request
#[derive(Debug, Clone)]
pub struct ClientContext {
    /// Connection the request arrived on
    pub connection_id: ConnectionId,

    /// Outgoing channel for change notifications
    pub notifier: mpsc::Sender<Bytes>,
}

impl ClientContext {
    /// Create a context and the receiving end of its notification channel
    pub fn new(connection_id: ConnectionId) -> (Self, mpsc::Receiver<Bytes>) {
        let (notifier, rx) = mpsc::channel(NOTIFY_QUEUE);
        (
            Self {
                connection_id,
                notifier,
            },
            rx,
        )
    }
}
