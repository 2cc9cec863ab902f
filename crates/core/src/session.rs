//! Per-session conversational state.
//!
//! One `SessionState` exists per room session. The orchestrator owns it for
//! the lifetime of the session and shares it with the tool services as
//! `Arc<Mutex<SessionState>>`; it is dropped at teardown. The transcript is
//! append-only and ordered by arrival, whatever the source of a turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One flashcard fetched from the progress service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    pub prompt: String,
    pub reference_answer: Option<String>,
}

/// The speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::System => write!(f, "system"),
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation turn, spoken or injected over the side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// Mutable state for one assistant session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub topic_id: String,
    pub user_id: String,
    /// The card currently presented to the user. Set by a successful fetch,
    /// cleared by an accepted progress submission.
    pub active_card: Option<Flashcard>,
    /// Append-only transcript, ordered by arrival.
    pub history: Vec<Turn>,
}

impl SessionState {
    pub fn new(topic_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            user_id: user_id.into(),
            active_card: None,
            history: Vec::new(),
        }
    }

    /// Appends a turn to the transcript.
    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>) {
        self.history.push(Turn::new(role, text));
    }
}
