//! Defines the WebSocket message protocol between the transport edge and the
//! agent service.
//!
//! The transport edge owns audio: it runs recognition before sending
//! `utterance` frames and synthesis after receiving `say` frames. Only text
//! crosses this boundary.

use serde::{Deserialize, Serialize};

/// Messages sent by the transport edge.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Joins a room and starts a session. Must be the first message; the
    /// metadata object carries `behaviorType`, `topicId` and `userId`.
    Join {
        room: String,
        metadata: serde_json::Value,
    },
    /// A finalized recognized utterance from the participant.
    Utterance { text: String },
}

/// Messages sent to the transport edge.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the session started.
    Joined { room: String },
    /// Text for the synthesis engine to speak to the participant.
    Say { text: String },
    /// Reports a fatal error before the connection is closed.
    Error { message: String },
}
