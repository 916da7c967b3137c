//! # Relay Wire Protocol
//!
//! Defines the JSON messages exchanged with classroom clients over the
//! WebSocket connection. Both directions use a tagged representation: every
//! frame is a JSON object whose `type` field selects the variant.
//!
//! ## Design:
//! Inbound payloads are decoded exactly once, at the connection boundary,
//! into the closed `ClientMessage` enum. Anything that does not parse into
//! one of its variants (unknown `type`, missing fields, malformed JSON) is
//! rejected with an `error` frame to that client alone; it never reaches the
//! router and never touches session state.
//!
//! ## Message Flow:
//! - Teacher client: `create_room` then a stream of `transcript` frames
//! - Student client: `join_room` then passively receives `translation` frames
//! - Server: `created`/`joined` acknowledgements, `student_count` updates to
//!   the teacher, `error` frames for rejected input

use serde::{Deserialize, Serialize};

/// Messages a classroom client may send to the relay.
///
/// ## Wire format:
/// The `roomCode` spelling is part of the wire contract with the browser
/// client, so the Rust field carries an explicit serde rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Teacher opens a new classroom session under a caller-chosen code.
    #[serde(rename = "create_room")]
    CreateRoom {
        /// Opaque session code chosen by the teacher client
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    /// Student asks to join an existing classroom session.
    #[serde(rename = "join_room")]
    JoinRoom {
        /// Code of the session to join
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    /// One unit of spoken-language text from the teacher, to be translated
    /// and relayed. Only honored when the connection holds the sender role.
    #[serde(rename = "transcript")]
    Transcript {
        /// Source-language text as transcribed in the classroom
        text: String,
    },
}

/// Messages the relay sends to classroom clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Acknowledges `create_room`; the session now exists under this code.
    #[serde(rename = "created")]
    Created {
        #[serde(rename = "roomCode")]
        room_code: String,
    },

    /// Acknowledges `join_room`; the connection is now a receiver.
    #[serde(rename = "joined")]
    Joined,

    /// A rejected request, with a human-readable reason.
    #[serde(rename = "error")]
    Error {
        message: String,
    },

    /// Sent to the teacher whenever the session's receiver count changes.
    #[serde(rename = "student_count")]
    StudentCount {
        count: usize,
    },

    /// A translated transcript, broadcast to every receiver of the session.
    #[serde(rename = "translation")]
    Translation {
        /// Text exactly as the teacher spoke it
        original: String,
        /// Translated text (equal to `original` when translation fell back)
        translated: String,
    },
}

impl ServerMessage {
    /// Serialize this message to its wire form.
    ///
    /// Serialization of these enums cannot fail in practice (no maps with
    /// non-string keys, no non-finite floats), but the signature keeps the
    /// fallibility visible to callers that log on it.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The inbound wire spellings are a contract with the browser client.
    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "create_room", "roomCode": "ABC"}"#).unwrap();
        assert_eq!(msg, ClientMessage::CreateRoom { room_code: "ABC".to_string() });

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "join_room", "roomCode": "ABC"}"#).unwrap();
        assert_eq!(msg, ClientMessage::JoinRoom { room_code: "ABC".to_string() });

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "transcript", "text": "Günaydın"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Transcript { text: "Günaydın".to_string() });
    }

    /// Unknown message kinds must fail decoding instead of silently mapping
    /// onto some variant.
    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "shout", "text": "hi"}"#).is_err());
        // A known kind with its required field missing is rejected too
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "join_room"}"#).is_err());
        // As is something that isn't a JSON object at all
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }

    /// Outbound frames must serialize to the exact shapes in the client contract.
    #[test]
    fn test_server_message_wire_format() {
        let created = ServerMessage::Created { room_code: "X1".to_string() };
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"type": "created", "roomCode": "X1"})
        );

        let joined = ServerMessage::Joined;
        assert_eq!(serde_json::to_value(&joined).unwrap(), json!({"type": "joined"}));

        let count = ServerMessage::StudentCount { count: 2 };
        assert_eq!(
            serde_json::to_value(&count).unwrap(),
            json!({"type": "student_count", "count": 2})
        );

        let translation = ServerMessage::Translation {
            original: "Günaydın".to_string(),
            translated: "Good morning".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&translation).unwrap(),
            json!({
                "type": "translation",
                "original": "Günaydın",
                "translated": "Good morning"
            })
        );
    }

    /// Error frames carry a human-readable message.
    #[test]
    fn test_error_message_creation() {
        let error_msg = ServerMessage::Error { message: "Room not found".to_string() };
        let json = error_msg.to_json().unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Room not found"));
    }
}
