//! # Connection Identity and Role Tracking
//!
//! Everything the relay knows about a single live WebSocket connection:
//! a stable identifier, a handle for delivering frames to it, and the
//! mutable-once record of which role (teacher or student) it took in
//! which classroom session.
//!
//! ## Why explicit identifiers:
//! Membership and comparison never rely on actor reference identity. Every
//! connection gets a generated `ConnectionId` at accept time, and all
//! registry bookkeeping keys off that id.

use crate::protocol::ServerMessage;
use actix::prelude::*;
use std::fmt;
use uuid::Uuid;

/// Stable identifier for one live connection, generated at accept time.
///
/// ## Rust Concepts:
/// - **Newtype pattern**: Wrapping Uuid prevents mixing connection ids up
///   with other Uuid-valued identifiers at compile time
/// - **Copy**: A Uuid is 16 bytes, cheap enough to copy everywhere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh id for a newly accepted connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Actor message carrying one outbound protocol frame to a connection.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Outbound(pub ServerMessage);

/// Actor message telling a connection actor to close its socket and stop.
/// Sent to every receiver of a session when its sender disconnects.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect;

/// Delivery handle for one live connection: its stable id plus the actor
/// mailbox endpoints used to push frames to it or force it closed.
///
/// ## Cloning:
/// Handles are cheap to clone (a Copy id and two mailbox references), so the
/// registry hands out snapshots freely without holding any lock while a
/// caller delivers frames.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: Recipient<Outbound>,
    control: Recipient<Disconnect>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, outbound: Recipient<Outbound>, control: Recipient<Disconnect>) -> Self {
        Self { id, outbound, control }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Deliver one frame to this connection, best effort.
    ///
    /// Returns false if the mailbox is gone or full. A closed connection is
    /// not an error for the caller; the registry is responsible for removing
    /// it from membership lists, not the delivery path.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbound.try_send(Outbound(message)).is_ok()
    }

    /// Ask this connection's actor to close its socket. Best effort, same
    /// stale-mailbox rules as `send`.
    pub fn disconnect(&self) -> bool {
        self.control.try_send(Disconnect).is_ok()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.id).finish()
    }
}

/// The role a connection has taken within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// The single teacher connection allowed to submit transcripts
    Sender,
    /// A student connection that passively receives translations
    Receiver,
}

impl ConnectionRole {
    /// Role name used in logs and observability output.
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionRole::Sender => "sender",
            ConnectionRole::Receiver => "receiver",
        }
    }
}

/// Error returned when something tries to assign a role to a connection
/// that already holds one. Roles are write-once for a connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAlreadyAssigned {
    pub role: ConnectionRole,
    pub room_code: String,
}

impl fmt::Display for RoleAlreadyAssigned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection is already {} in room '{}'", self.role.as_str(), self.room_code)
    }
}

/// Per-connection role state, initialized to `Unassigned` on connect.
///
/// ## State machine:
/// `Unassigned` transitions at most once to `Assigned` (by a successful
/// create or join), and never transitions back or sideways. Every later
/// message and the close handler only read the state.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Fresh connection that has not created or joined a session
    Unassigned,
    /// Connection committed to a role in a session for its whole lifetime
    Assigned {
        role: ConnectionRole,
        room_code: String,
    },
}

impl ConnectionState {
    pub fn new() -> Self {
        ConnectionState::Unassigned
    }

    /// Commit this connection to a role and session.
    ///
    /// Succeeds exactly once. The enum transition makes a second assignment
    /// impossible to express without going through this error path, which
    /// leaves the original assignment untouched.
    pub fn assign(&mut self, role: ConnectionRole, room_code: String) -> Result<(), RoleAlreadyAssigned> {
        match self {
            ConnectionState::Unassigned => {
                *self = ConnectionState::Assigned { role, room_code };
                Ok(())
            }
            ConnectionState::Assigned { role, room_code } => Err(RoleAlreadyAssigned {
                role: *role,
                room_code: room_code.clone(),
            }),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self, ConnectionState::Unassigned)
    }

    /// Read accessor used by the router and the close handler.
    pub fn current(&self) -> Option<(ConnectionRole, &str)> {
        match self {
            ConnectionState::Unassigned => None,
            ConnectionState::Assigned { role, room_code } => Some((*role, room_code.as_str())),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
    }

    /// A fresh connection is unassigned and reports no role.
    #[test]
    fn test_state_starts_unassigned() {
        let state = ConnectionState::new();
        assert!(state.is_unassigned());
        assert_eq!(state.current(), None);
    }

    /// The first assignment succeeds and becomes readable.
    #[test]
    fn test_assign_once() {
        let mut state = ConnectionState::new();
        assert!(state.assign(ConnectionRole::Sender, "ABC".to_string()).is_ok());
        assert!(!state.is_unassigned());

        let (role, code) = state.current().unwrap();
        assert_eq!(role, ConnectionRole::Sender);
        assert_eq!(code, "ABC");
    }

    /// A second assignment fails and leaves the original role in place.
    #[test]
    fn test_second_assignment_is_rejected() {
        let mut state = ConnectionState::new();
        state.assign(ConnectionRole::Receiver, "ABC".to_string()).unwrap();

        let err = state.assign(ConnectionRole::Sender, "XYZ".to_string()).unwrap_err();
        assert_eq!(err.role, ConnectionRole::Receiver);
        assert_eq!(err.room_code, "ABC");

        // Original assignment is untouched
        let (role, code) = state.current().unwrap();
        assert_eq!(role, ConnectionRole::Receiver);
        assert_eq!(code, "ABC");
    }
}
