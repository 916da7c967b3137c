//! # WebSocket Relay Handler
//!
//! Handles the live classroom connections. Teachers and students connect to
//! `/ws`, exchange the JSON frames defined in `protocol`, and the router in
//! this module drives the session registry accordingly.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: a client connects and starts with no role
//! 2. **Role commitment**: its first accepted `create_room` or `join_room`
//!    fixes its role and session for the connection's whole lifetime
//! 3. **Relay**: `transcript` frames from the teacher are translated and
//!    broadcast to every student in the session
//! 4. **Teardown**: the teacher's disconnect closes the session and every
//!    student connection in it; a student's disconnect just updates the count
//!
//! ## Isolation:
//! Each connection is an independent actor. A malformed frame is answered
//! with an `error` frame on that connection alone; it cannot corrupt the
//! registry or disturb any other classroom.

use crate::broadcast;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::connection::{
    ConnectionHandle, ConnectionId, ConnectionRole, ConnectionState, Disconnect, Outbound,
};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// WebSocket actor for one classroom connection.
///
/// ## Actor Model:
/// Uses Actix's actor system where each WebSocket connection is an
/// independent actor that can receive and send messages asynchronously.
/// All registry mutations happen synchronously inside the actor's message
/// handlers; only the translation call suspends, and it runs in a spawned
/// task that re-reads the registry when it completes.
pub struct RelayWebSocket {
    /// Stable identity of this connection, generated at accept time
    conn_id: ConnectionId,

    /// Role tracker: unassigned until a successful create or join, then
    /// fixed for the lifetime of the connection
    state: ConnectionState,

    /// Shared application state (registry, translator, metrics, config)
    app_state: AppState,

    /// How often to ping the client
    heartbeat_interval: Duration,

    /// How long the client may stay silent before being dropped
    client_timeout: Duration,

    /// Last time we heard anything from the client
    last_heartbeat: Instant,
}

impl RelayWebSocket {
    /// Create a new WebSocket actor for a freshly accepted connection.
    pub fn new(app_state: AppState) -> Self {
        let config = app_state.get_config();
        Self {
            conn_id: ConnectionId::generate(),
            state: ConnectionState::new(),
            heartbeat_interval: Duration::from_secs(config.performance.heartbeat_interval_secs),
            client_timeout: Duration::from_secs(config.performance.client_timeout_secs),
            app_state,
            last_heartbeat: Instant::now(),
        }
    }

    /// Build the registry-facing handle for this connection.
    fn delivery_handle(&self, ctx: &mut ws::WebsocketContext<Self>) -> ConnectionHandle {
        let addr = ctx.address();
        ConnectionHandle::new(self.conn_id, addr.clone().recipient(), addr.recipient())
    }

    /// Serialize and send one frame to this connection's client.
    fn send_message(&self, ctx: &mut ws::WebsocketContext<Self>, message: &ServerMessage) {
        match message.to_json() {
            Ok(json) => ctx.text(json),
            Err(err) => error!(connection_id = %self.conn_id, error = %err, "Failed to serialize outbound frame"),
        }
    }

    /// `create_room`: commit this connection as the session's teacher.
    ///
    /// The role assignment runs first; a connection that already holds a
    /// role is rejected before the registry is touched. Creation itself
    /// always succeeds and displaces any live session under the same code.
    fn handle_create_room(&mut self, room_code: String, ctx: &mut ws::WebsocketContext<Self>) {
        if let Err(err) = self.state.assign(ConnectionRole::Sender, room_code.clone()) {
            warn!(connection_id = %self.conn_id, error = %err, "Rejected create_room");
            self.send_message(ctx, &ServerMessage::Error { message: err.to_string() });
            return;
        }

        let handle = self.delivery_handle(ctx);
        let displaced = self.app_state.registry.create(&room_code, handle);
        self.app_state.session_created(displaced);

        info!(connection_id = %self.conn_id, room_code = %room_code, "Room created");
        self.send_message(ctx, &ServerMessage::Created { room_code });
    }

    /// `join_room`: commit this connection as a student of the session.
    ///
    /// On an unknown code the connection stays unassigned, so the client is
    /// free to retry with another code.
    fn handle_join_room(&mut self, room_code: String, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some((role, code)) = self.state.current() {
            warn!(
                connection_id = %self.conn_id,
                role = role.as_str(),
                room_code = %code,
                "Rejected join_room from an already assigned connection"
            );
            self.send_message(ctx, &ServerMessage::Error {
                message: format!("Connection is already {} in room '{}'", role.as_str(), code),
            });
            return;
        }

        let handle = self.delivery_handle(ctx);
        match self.app_state.registry.join(&room_code, handle) {
            Ok(count) => {
                if let Err(err) = self.state.assign(ConnectionRole::Receiver, room_code.clone()) {
                    // Unreachable: the unassigned check above gates this path
                    error!(connection_id = %self.conn_id, error = %err, "Role tracker out of sync after join");
                }

                info!(connection_id = %self.conn_id, room_code = %room_code, student_count = count, "Student joined");
                self.send_message(ctx, &ServerMessage::Joined);

                // Tell the teacher how many students are now listening
                if let Some(snapshot) = self.app_state.registry.lookup(&room_code) {
                    broadcast::notify(&snapshot.sender, &ServerMessage::StudentCount { count });
                }
            }
            Err(err) => {
                info!(connection_id = %self.conn_id, room_code = %room_code, error = %err, "Join failed");
                self.send_message(ctx, &ServerMessage::Error { message: "Room not found".to_string() });
            }
        }
    }

    /// `transcript`: translate and broadcast, sender role only.
    ///
    /// Returns whether a relay task was started. From any other role the
    /// frame is dropped without a reply; that silence is part of the
    /// protocol contract, not an oversight.
    ///
    /// The translation call is the only suspending step in the relay, so it
    /// runs in a spawned task. When it completes, the session is looked up
    /// again and the broadcast only happens if the session still exists and
    /// still belongs to this sender; a session displaced or torn down while
    /// the translation was in flight receives nothing.
    fn relay_transcript(
        app_state: AppState,
        state: &ConnectionState,
        sender_id: ConnectionId,
        text: String,
    ) -> bool {
        let room_code = match state.current() {
            Some((ConnectionRole::Sender, code)) => code.to_string(),
            _ => {
                debug!(connection_id = %sender_id, "Ignored transcript from a non-sender connection");
                return false;
            }
        };

        let translator = app_state.get_translator();

        tokio::spawn(async move {
            let outcome = translator.translate(&text).await;

            let snapshot = match app_state.registry.lookup(&room_code) {
                Some(snapshot) if snapshot.sender.id() == sender_id => snapshot,
                _ => {
                    debug!(room_code = %room_code, "Dropped transcript for a torn-down or displaced session");
                    return;
                }
            };

            let delivered = broadcast::broadcast(
                &snapshot.receivers,
                &ServerMessage::Translation {
                    original: text,
                    translated: outcome.text,
                },
            );
            app_state.transcript_relayed(outcome.degraded);

            debug!(
                room_code = %room_code,
                delivered,
                degraded = outcome.degraded,
                "Translation broadcast"
            );
        });

        true
    }
}

/// Implement Actor trait for WebSocket handling.
impl Actor for RelayWebSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Called when the WebSocket connection starts.
    fn started(&mut self, ctx: &mut Self::Context) {
        info!(connection_id = %self.conn_id, "WebSocket connection started");
        self.app_state.connection_opened();

        // Supervise the client with protocol-level pings
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!(connection_id = %act.conn_id, "WebSocket heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    /// Called when the WebSocket connection stops.
    ///
    /// This is the terminal transition of the connection state machine:
    /// - sender: tear the session down and force its students out
    /// - receiver: leave the session and update the teacher's count
    /// - unassigned: nothing to clean up
    ///
    /// A connection that never completed create or join takes the last
    /// branch, so closing it touches no registry state at all.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.app_state.connection_closed();

        match self.state.current() {
            Some((ConnectionRole::Sender, code)) => {
                // Identity-guarded: if this code was re-created by a newer
                // teacher, teardown declines and the successor session lives on
                if let Some(receivers) = self.app_state.registry.teardown(code, self.conn_id) {
                    info!(
                        connection_id = %self.conn_id,
                        room_code = %code,
                        student_count = receivers.len(),
                        "Teacher disconnected, closing session"
                    );
                    broadcast::disconnect_all(&receivers);
                }
            }
            Some((ConnectionRole::Receiver, code)) => {
                if let Some(count) = self.app_state.registry.leave(code, self.conn_id) {
                    info!(
                        connection_id = %self.conn_id,
                        room_code = %code,
                        student_count = count,
                        "Student disconnected"
                    );
                    if let Some(snapshot) = self.app_state.registry.lookup(code) {
                        broadcast::notify(&snapshot.sender, &ServerMessage::StudentCount { count });
                    }
                }
            }
            None => {
                debug!(connection_id = %self.conn_id, "Unassigned connection closed");
            }
        }
    }
}

/// Handle incoming WebSocket frames: the message router.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelayWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                // Decode once at the boundary; everything past this match
                // works with typed variants only
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::CreateRoom { room_code }) => {
                        self.handle_create_room(room_code, ctx);
                    }
                    Ok(ClientMessage::JoinRoom { room_code }) => {
                        self.handle_join_room(room_code, ctx);
                    }
                    Ok(ClientMessage::Transcript { text }) => {
                        Self::relay_transcript(
                            self.app_state.clone(),
                            &self.state,
                            self.conn_id,
                            text,
                        );
                    }
                    Err(err) => {
                        // Malformed JSON or an unknown message kind. Rejected
                        // on this connection alone; the registry is untouched.
                        warn!(connection_id = %self.conn_id, error = %err, "Rejected unparseable frame");
                        self.send_message(ctx, &ServerMessage::Error {
                            message: "Unrecognized or malformed message".to_string(),
                        });
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                // The relay protocol is text-only
                warn!(connection_id = %self.conn_id, "Ignored unexpected binary frame");
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(connection_id = %self.conn_id, reason = ?reason, "WebSocket closed by client");
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(connection_id = %self.conn_id, "Received unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {
                // Internal no-op frames
            }
            Err(err) => {
                error!(connection_id = %self.conn_id, error = %err, "WebSocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Handle frames queued by the registry and broadcast paths.
impl Handler<Outbound> for RelayWebSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        self.send_message(ctx, &msg.0);
    }
}

/// Handle forced disconnects (session teardown reaching this receiver).
impl Handler<Disconnect> for RelayWebSocket {
    type Result = ();

    fn handle(&mut self, _msg: Disconnect, ctx: &mut Self::Context) {
        info!(connection_id = %self.conn_id, "Connection closed by session teardown");
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Normal,
            description: Some("Session closed by teacher".to_string()),
        }));
        ctx.stop();
    }
}

/// WebSocket endpoint handler.
///
/// ## HTTP to WebSocket Upgrade:
/// This function handles the initial HTTP request and upgrades it to a
/// WebSocket connection. The actual relay protocol is handled by the
/// RelayWebSocket actor.
pub async fn relay_websocket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(peer = ?req.connection_info().peer_addr(), "New WebSocket connection request");

    let websocket = RelayWebSocket::new(app_state.get_ref().clone());
    ws::start(websocket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::sync::{Arc, Mutex};

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

    /// App state whose translation endpoint refuses connections, so every
    /// translate call exercises the deterministic fallback path.
    fn test_state() -> AppState {
        let mut config = AppConfig::default();
        config.translation.endpoint = "http://127.0.0.1:1/translate".to_string();
        config.translation.timeout_ms = 1000;
        AppState::new(config).unwrap()
    }

    fn assigned(role: ConnectionRole, code: &str) -> ConnectionState {
        let mut state = ConnectionState::new();
        state.assign(role, code.to_string()).unwrap();
        state
    }

    /// Transcripts from unassigned or receiver connections start no relay.
    #[actix_web::test]
    async fn test_transcript_requires_sender_role() {
        let app_state = test_state();

        let unassigned = ConnectionState::new();
        assert!(!RelayWebSocket::relay_transcript(
            app_state.clone(),
            &unassigned,
            ConnectionId::generate(),
            "Merhaba".to_string(),
        ));

        let receiver = assigned(ConnectionRole::Receiver, "X1");
        assert!(!RelayWebSocket::relay_transcript(
            app_state,
            &receiver,
            ConnectionId::generate(),
            "Merhaba".to_string(),
        ));
    }

    /// A sender's transcript reaches every receiver of its session exactly
    /// once, with the fallback text when translation is unavailable, and
    /// reaches no other session's receivers.
    #[actix_web::test]
    async fn test_transcript_broadcast_with_fallback() {
        let app_state = test_state();

        let (sender, _) = collecting_handle();
        let sender_id = sender.id();
        app_state.registry.create("X1", sender);

        let (r1, r1_frames) = collecting_handle();
        let (r2, r2_frames) = collecting_handle();
        app_state.registry.join("X1", r1).unwrap();
        app_state.registry.join("X1", r2).unwrap();

        // An unrelated classroom must hear nothing
        let (other_sender, _) = collecting_handle();
        app_state.registry.create("Y2", other_sender);
        let (other_receiver, other_frames) = collecting_handle();
        app_state.registry.join("Y2", other_receiver).unwrap();

        let state = assigned(ConnectionRole::Sender, "X1");
        assert!(RelayWebSocket::relay_transcript(
            app_state.clone(),
            &state,
            sender_id,
            "Merhaba".to_string(),
        ));

        // Give the relay task time to fail its translate call and broadcast
        tokio::time::sleep(Duration::from_millis(500)).await;

        let expected = ServerMessage::Translation {
            original: "Merhaba".to_string(),
            translated: "Merhaba".to_string(),
        };
        assert_eq!(r1_frames.lock().unwrap().as_slice(), &[expected.clone()]);
        assert_eq!(r2_frames.lock().unwrap().as_slice(), &[expected]);
        assert!(other_frames.lock().unwrap().is_empty());

        let metrics = app_state.get_metrics_snapshot();
        assert_eq!(metrics.transcripts_relayed, 1);
        assert_eq!(metrics.degraded_translations, 1);
    }

    /// After a session code is re-created by a new teacher, the displaced
    /// teacher's transcripts reach nobody.
    #[actix_web::test]
    async fn test_transcript_dropped_after_displacement() {
        let app_state = test_state();

        let (old_sender, _) = collecting_handle();
        let old_sender_id = old_sender.id();
        app_state.registry.create("X1", old_sender);

        // A new teacher takes the code over and gathers a student
        let (new_sender, _) = collecting_handle();
        app_state.registry.create("X1", new_sender);
        let (receiver, frames) = collecting_handle();
        app_state.registry.join("X1", receiver).unwrap();

        let state = assigned(ConnectionRole::Sender, "X1");
        assert!(RelayWebSocket::relay_transcript(
            app_state.clone(),
            &state,
            old_sender_id,
            "Merhaba".to_string(),
        ));

        tokio::time::sleep(Duration::from_millis(500)).await;

        // The new session's receiver heard nothing from the displaced teacher
        assert!(frames.lock().unwrap().is_empty());
        assert_eq!(app_state.get_metrics_snapshot().transcripts_relayed, 0);
    }
}
