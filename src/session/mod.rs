//! # Session Management Module
//!
//! Everything that defines who belongs to which classroom session and what a
//! single connection is allowed to do. This is the stateful heart of the
//! relay; the WebSocket layer is a thin shell around it.
//!
//! ## Key Components:
//! - **Connection identity and role tracking**: stable per-connection ids,
//!   delivery handles, and the write-once role state machine
//! - **Session registry**: the map from session code to sender plus
//!   receivers, with create/join/leave/teardown semantics
//!
//! ## Invariants:
//! - A session exists in the registry iff it was created and not yet torn down
//! - A session has at most one sender
//! - A connection's role, once assigned, never changes for its lifetime

pub mod connection;  // Connection ids, delivery handles, role state
pub mod registry;    // Session code to membership mapping

pub use connection::{ConnectionHandle, ConnectionId, ConnectionRole, ConnectionState};
pub use registry::{RegistryError, SessionRegistry};
