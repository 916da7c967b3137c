//! # Session Registry
//!
//! The single source of truth for which sender and receivers belong to which
//! classroom session. Owns the map from session code to session state and
//! every mutation of it.
//!
//! ## Session Lifecycle:
//! 1. **Created**: a teacher's `create_room` registers the session (displacing
//!    any previous session under the same code)
//! 2. **Mutated**: student joins and leaves update the receiver list
//! 3. **Torn down**: the teacher's disconnect removes the session and hands
//!    the former receivers back to the caller for forced disconnect
//!
//! ## Thread Safety:
//! The server runs on multiple actix worker threads, so the map lives behind
//! a `RwLock`. Every operation here is a single synchronous critical section;
//! nothing in this module ever awaits, so no lock is ever held across a
//! suspension point. The one suspending step in the whole relay (the
//! translation call) happens far away from here and re-reads the registry
//! afterwards.

use crate::session::connection::{ConnectionHandle, ConnectionId};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Errors produced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A join was attempted against a code with no registered session
    SessionNotFound(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::SessionNotFound(code) => write!(f, "no session registered under '{}'", code),
        }
    }
}

/// One classroom session: exactly one sender plus its receivers.
///
/// Receiver membership is set-like by connection id, but insertion order is
/// preserved because the count reporting (and nothing else) depends on it.
struct Session {
    sender: ConnectionHandle,
    receivers: Vec<ConnectionHandle>,
}

/// Read-only routing view of a session, handed out to callers that deliver
/// frames. Holding a snapshot holds no lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub sender: ConnectionHandle,
    pub receivers: Vec<ConnectionHandle>,
}

/// Observability row for one live session (health and debug endpoints).
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_code: String,
    pub student_count: usize,
}

/// The registry itself. Cloneable; all clones share the same map.
///
/// ## Ownership:
/// Constructed once at startup and held by `AppState`, never a process
/// global. Its lifecycle is the server's lifecycle; per-session state ends
/// with `teardown`, everything ends when the process exits.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a session under `code` with `sender` as its teacher.
    ///
    /// Always succeeds. An existing session under the same code is displaced:
    /// its entry is replaced wholesale and its former members simply stop
    /// being reachable through this code. Returns whether a displacement
    /// happened, for logging and metrics only.
    pub fn create(&self, code: &str, sender: ConnectionHandle) -> bool {
        let mut sessions = self.sessions.write().unwrap();

        let displaced = sessions
            .insert(
                code.to_string(),
                Session { sender, receivers: Vec::new() },
            )
            .is_some();

        if displaced {
            warn!(room_code = %code, "Session code re-created, previous session displaced");
        } else {
            debug!(room_code = %code, "Session created");
        }

        displaced
    }

    /// Add a receiver to the session under `code`.
    ///
    /// Returns the receiver count after the join. Fails with
    /// `SessionNotFound` if no session is registered under the code. A
    /// receiver id that is already a member is not duplicated; the current
    /// count is returned unchanged.
    pub fn join(&self, code: &str, receiver: ConnectionHandle) -> Result<usize, RegistryError> {
        let mut sessions = self.sessions.write().unwrap();

        let session = sessions
            .get_mut(code)
            .ok_or_else(|| RegistryError::SessionNotFound(code.to_string()))?;

        if !session.receivers.iter().any(|r| r.id() == receiver.id()) {
            session.receivers.push(receiver);
        }

        debug!(room_code = %code, student_count = session.receivers.len(), "Student joined");
        Ok(session.receivers.len())
    }

    /// Remove a receiver from the session under `code`.
    ///
    /// Idempotent: a missing session or a connection that is not a member is
    /// a no-op, not an error. Returns `Some(count_after)` only when an actual
    /// removal happened, so the close path never reports a count to a session
    /// the connection was no longer part of (displacement makes that case
    /// reachable).
    pub fn leave(&self, code: &str, receiver: ConnectionId) -> Option<usize> {
        let mut sessions = self.sessions.write().unwrap();

        let session = sessions.get_mut(code)?;
        let before = session.receivers.len();
        session.receivers.retain(|r| r.id() != receiver);

        if session.receivers.len() == before {
            return None;
        }

        debug!(room_code = %code, student_count = session.receivers.len(), "Student left");
        Some(session.receivers.len())
    }

    /// Remove the session under `code` and return its former receivers,
    /// in insertion order, for forced disconnect by the caller.
    ///
    /// Guarded by the sender's identity: the session is only torn down if its
    /// registered sender is `sender`. A displaced teacher's late disconnect
    /// therefore cannot destroy the session that replaced its own. Returns
    /// `None` when the guard (or the lookup) fails.
    pub fn teardown(&self, code: &str, sender: ConnectionId) -> Option<Vec<ConnectionHandle>> {
        let mut sessions = self.sessions.write().unwrap();

        match sessions.get(code) {
            Some(session) if session.sender.id() == sender => {}
            Some(_) => {
                debug!(room_code = %code, "Teardown skipped, session belongs to a newer sender");
                return None;
            }
            None => return None,
        }

        let session = sessions.remove(code)?;
        debug!(
            room_code = %code,
            student_count = session.receivers.len(),
            "Session torn down"
        );
        Some(session.receivers)
    }

    /// Read-only accessor used to validate and route transcript broadcasts.
    pub fn lookup(&self, code: &str) -> Option<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(code).map(|session| SessionSnapshot {
            sender: session.sender.clone(),
            receivers: session.receivers.clone(),
        })
    }

    /// Number of live sessions.
    pub fn active_session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Per-session observability rows for the health and debug endpoints.
    pub fn summary(&self) -> Vec<RoomSummary> {
        let sessions = self.sessions.read().unwrap();
        let mut rooms: Vec<RoomSummary> = sessions
            .iter()
            .map(|(code, session)| RoomSummary {
                room_code: code.clone(),
                student_count: session.receivers.len(),
            })
            .collect();
        // HashMap iteration order is arbitrary; keep the output stable
        rooms.sort_by(|a, b| a.room_code.cmp(&b.room_code));
        rooms
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::connection::{Disconnect, Outbound};
    use actix::prelude::*;

    /// Minimal actor standing in for a connection; swallows everything.
    struct NullClient;

    impl Actor for NullClient {
        type Context = Context<Self>;
    }

    impl Handler<Outbound> for NullClient {
        type Result = ();
        fn handle(&mut self, _msg: Outbound, _ctx: &mut Context<Self>) {}
    }

    impl Handler<Disconnect> for NullClient {
        type Result = ();
        fn handle(&mut self, _msg: Disconnect, _ctx: &mut Context<Self>) {}
    }

    fn test_handle() -> ConnectionHandle {
        let addr = NullClient.start();
        ConnectionHandle::new(
            ConnectionId::generate(),
            addr.clone().recipient(),
            addr.recipient(),
        )
    }

    /// create followed by lookup returns the sender with no receivers.
    #[actix_web::test]
    async fn test_create_then_lookup() {
        let registry = SessionRegistry::new();
        let sender = test_handle();

        let displaced = registry.create("ABC", sender.clone());
        assert!(!displaced);

        let snapshot = registry.lookup("ABC").unwrap();
        assert_eq!(snapshot.sender.id(), sender.id());
        assert!(snapshot.receivers.is_empty());
    }

    /// Joining a code with no prior create fails with SessionNotFound.
    #[actix_web::test]
    async fn test_join_unknown_code() {
        let registry = SessionRegistry::new();
        let result = registry.join("NOPE", test_handle());
        assert_eq!(result, Err(RegistryError::SessionNotFound("NOPE".to_string())));
    }

    /// Successive joins report counts 1 then 2, preserving insertion order.
    #[actix_web::test]
    async fn test_join_counts_and_order() {
        let registry = SessionRegistry::new();
        registry.create("ABC", test_handle());

        let r1 = test_handle();
        let r2 = test_handle();
        assert_eq!(registry.join("ABC", r1.clone()), Ok(1));
        assert_eq!(registry.join("ABC", r2.clone()), Ok(2));

        let snapshot = registry.lookup("ABC").unwrap();
        let ids: Vec<_> = snapshot.receivers.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![r1.id(), r2.id()]);
    }

    /// A receiver id that is already a member is not duplicated.
    #[actix_web::test]
    async fn test_join_is_set_like() {
        let registry = SessionRegistry::new();
        registry.create("ABC", test_handle());

        let receiver = test_handle();
        assert_eq!(registry.join("ABC", receiver.clone()), Ok(1));
        assert_eq!(registry.join("ABC", receiver), Ok(1));
    }

    /// leave removes exactly the named connection and is idempotent.
    #[actix_web::test]
    async fn test_leave_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.create("ABC", test_handle());

        let r1 = test_handle();
        let r2 = test_handle();
        registry.join("ABC", r1.clone()).unwrap();
        registry.join("ABC", r2.clone()).unwrap();

        assert_eq!(registry.leave("ABC", r1.id()), Some(1));
        // Second leave of the same connection is a no-op
        assert_eq!(registry.leave("ABC", r1.id()), None);
        // Unknown session code is a no-op too
        assert_eq!(registry.leave("ZZZ", r2.id()), None);

        let snapshot = registry.lookup("ABC").unwrap();
        assert_eq!(snapshot.receivers.len(), 1);
        assert_eq!(snapshot.receivers[0].id(), r2.id());
    }

    /// teardown removes the session and returns the receivers in order.
    #[actix_web::test]
    async fn test_teardown_returns_receivers() {
        let registry = SessionRegistry::new();
        let sender = test_handle();
        registry.create("ABC", sender.clone());

        let r1 = test_handle();
        let r2 = test_handle();
        registry.join("ABC", r1.clone()).unwrap();
        registry.join("ABC", r2.clone()).unwrap();

        let receivers = registry.teardown("ABC", sender.id()).unwrap();
        let ids: Vec<_> = receivers.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![r1.id(), r2.id()]);

        // Session is gone from the registry
        assert!(registry.lookup("ABC").is_none());
        assert_eq!(registry.active_session_count(), 0);
    }

    /// teardown by anything but the registered sender leaves the session intact.
    #[actix_web::test]
    async fn test_teardown_is_identity_guarded() {
        let registry = SessionRegistry::new();
        let sender = test_handle();
        registry.create("ABC", sender.clone());

        assert!(registry.teardown("ABC", ConnectionId::generate()).is_none());
        assert!(registry.lookup("ABC").is_some());

        // And teardown of a code that never existed is a no-op
        assert!(registry.teardown("ZZZ", sender.id()).is_none());
    }

    /// Re-creating a live code replaces the session wholesale: new sender,
    /// empty receiver list, old membership unreachable through the code.
    #[actix_web::test]
    async fn test_recreate_displaces_previous_session() {
        let registry = SessionRegistry::new();
        let old_sender = test_handle();
        registry.create("ABC", old_sender.clone());
        registry.join("ABC", test_handle()).unwrap();

        let new_sender = test_handle();
        let displaced = registry.create("ABC", new_sender.clone());
        assert!(displaced);

        let snapshot = registry.lookup("ABC").unwrap();
        assert_eq!(snapshot.sender.id(), new_sender.id());
        assert!(snapshot.receivers.is_empty());

        // The displaced teacher's close can no longer tear the code down
        assert!(registry.teardown("ABC", old_sender.id()).is_none());
        assert!(registry.lookup("ABC").is_some());
    }

    /// Summary rows are sorted and reflect live membership.
    #[actix_web::test]
    async fn test_summary() {
        let registry = SessionRegistry::new();
        registry.create("B2", test_handle());
        registry.create("A1", test_handle());
        registry.join("B2", test_handle()).unwrap();

        let rooms = registry.summary();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room_code, "A1");
        assert_eq!(rooms[0].student_count, 0);
        assert_eq!(rooms[1].room_code, "B2");
        assert_eq!(rooms[1].student_count, 1);
    }
}
