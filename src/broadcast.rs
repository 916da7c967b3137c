//! # Broadcast and Notify
//!
//! Best-effort, fire-and-forget delivery of outbound frames to one or many
//! connections. No acknowledgement, no retry, no delivery guarantee.
//!
//! ## Stale connections:
//! A connection whose mailbox is gone is skipped silently. That is not an
//! error condition for any caller here; membership cleanup is the session
//! registry's responsibility, driven by the close handlers, never by the
//! delivery path.

use crate::protocol::ServerMessage;
use crate::session::connection::ConnectionHandle;
use tracing::debug;

/// Deliver `message` to every connection in `targets` that is still open.
///
/// Returns how many deliveries were accepted, which callers use only for
/// logging. Frames are cloned per target; they are small JSON-bound enums.
pub fn broadcast(targets: &[ConnectionHandle], message: &ServerMessage) -> usize {
    let mut delivered = 0;
    for target in targets {
        if target.send(message.clone()) {
            delivered += 1;
        } else {
            debug!(connection_id = %target.id(), "Skipped broadcast to stale connection");
        }
    }
    delivered
}

/// Deliver `message` to a single connection, same open-check semantics as
/// `broadcast`. Returns whether the delivery was accepted.
pub fn notify(target: &ConnectionHandle, message: &ServerMessage) -> bool {
    let accepted = target.send(message.clone());
    if !accepted {
        debug!(connection_id = %target.id(), "Skipped notify to stale connection");
    }
    accepted
}

/// Ask every connection in `targets` to close. Used when a session's sender
/// disconnects and its receivers must be forced out.
pub fn disconnect_all(targets: &[ConnectionHandle]) {
    for target in targets {
        if !target.disconnect() {
            debug!(connection_id = %target.id(), "Receiver already gone during teardown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::connection::{ConnectionId, Disconnect, Outbound};
    use actix::prelude::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Stub connection actor that records every frame it is handed.
    struct CollectingClient {
        received: Arc<Mutex<Vec<ServerMessage>>>,
    }

    impl Actor for CollectingClient {
        type Context = Context<Self>;
    }

    impl Handler<Outbound> for CollectingClient {
        type Result = ();
        fn handle(&mut self, msg: Outbound, _ctx: &mut Context<Self>) {
            self.received.lock().unwrap().push(msg.0);
        }
    }

    impl Handler<Disconnect> for CollectingClient {
        type Result = ();
        fn handle(&mut self, _msg: Disconnect, ctx: &mut Context<Self>) {
            ctx.stop();
        }
    }

    fn collecting_handle() -> (ConnectionHandle, Arc<Mutex<Vec<ServerMessage>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let addr = CollectingClient { received: received.clone() }.start();
        let handle = ConnectionHandle::new(
            ConnectionId::generate(),
            addr.clone().recipient(),
            addr.recipient(),
        );
        (handle, received)
    }

    /// Every open target receives the frame exactly once.
    #[actix_web::test]
    async fn test_broadcast_reaches_all_open_targets() {
        let (h1, r1) = collecting_handle();
        let (h2, r2) = collecting_handle();

        let msg = ServerMessage::StudentCount { count: 2 };
        let delivered = broadcast(&[h1, h2], &msg);
        assert_eq!(delivered, 2);

        // Let the arbiter drain the stub mailboxes
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(r1.lock().unwrap().as_slice(), &[msg.clone()]);
        assert_eq!(r2.lock().unwrap().as_slice(), &[msg]);
    }

    /// A stopped target is skipped without disturbing the others.
    #[actix_web::test]
    async fn test_broadcast_skips_stale_connection() {
        let (alive, received) = collecting_handle();
        let (stale, _) = collecting_handle();

        // Stop the stale actor and give the arbiter time to drop its mailbox
        stale.disconnect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let msg = ServerMessage::Joined;
        let delivered = broadcast(&[stale, alive], &msg);
        assert_eq!(delivered, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    /// notify reports whether its single delivery was accepted.
    #[actix_web::test]
    async fn test_notify_single_target() {
        let (handle, received) = collecting_handle();

        assert!(notify(&handle, &ServerMessage::Joined));

        handle.disconnect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!notify(&handle, &ServerMessage::Joined));

        // Only the first frame arrived
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
