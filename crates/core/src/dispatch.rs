//! Behavior dispatch: participant metadata in, a prepared session out.
//!
//! Metadata arrives once, when the participant joins the room. Validation
//! happens before anything that could touch the network is constructed, so a
//! bad join costs nothing and leaves no trace.

use crate::progress::ProgressClient;
use crate::session::{SessionState, TurnRole};
use crate::tools::{EditorToolService, QuizToolService};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

const QUIZ_INSTRUCTIONS: &str = "You are the flashcard assistant tiro. Your interface with users is voice. \
    You quiz the user on flashcards. You have access to the tools get_next_due_card and update_card_progress. \
    get_next_due_card returns a flashcard with a question and an answer. Present the question to the user and \
    do not reveal the answer until the user has attempted to answer it. When the user answers, compare their \
    response to the flashcard answer: it does not have to match the exact wording, it should be factually \
    correct. Grade the answer either '1' (wrong or no answer) or '3' (correct), then call update_card_progress \
    with your rating to record the user's progress. If the answer had factual mistakes, give short feedback on \
    how it could be improved, then immediately ask the next question. If the answer was good, immediately fetch \
    and present the next question. Repeat until no more flashcards are available. If the user asks about some \
    flashcard detail, answer to the best of your knowledge.";

const EDITOR_INSTRUCTIONS: &str = "You are an assistant helping the user with their document. Your interface \
    with users is voice. Assist the user and modify the document as needed using tool calls.";

const QUIZ_GREETING: &str = "Hello! Let's practice some flashcards.";
const EDITOR_GREETING: &str = "Hello! How can I assist you with your document?";

/// Errors that make the session metadata unusable. All of them are fatal:
/// the session must not proceed past validation.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("session metadata is not a JSON object: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("session metadata is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unrecognized behaviorType `{0}`")]
    UnknownBehavior(String),
}

/// The behavior variants this worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Quiz,
    Editor,
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorKind::Quiz => write!(f, "quiz"),
            BehaviorKind::Editor => write!(f, "editor"),
        }
    }
}

/// Validated session-start metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMetadata {
    pub behavior: BehaviorKind,
    pub topic_id: String,
    pub user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    behavior_type: Option<String>,
    topic_id: Option<String>,
    user_id: Option<String>,
}

impl SessionMetadata {
    /// Parses and validates the participant metadata JSON. Every field is
    /// required and must be non-empty.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_value(value)?;
        let behavior_type = require(raw.behavior_type, "behaviorType")?;
        let behavior = match behavior_type.as_str() {
            "quiz" => BehaviorKind::Quiz,
            "editor" => BehaviorKind::Editor,
            other => return Err(MetadataError::UnknownBehavior(other.to_string())),
        };
        Ok(Self {
            behavior,
            topic_id: require(raw.topic_id, "topicId")?,
            user_id: require(raw.user_id, "userId")?,
        })
    }
}

fn require(field: Option<String>, name: &'static str) -> Result<String, MetadataError> {
    field
        .filter(|value| !value.is_empty())
        .ok_or(MetadataError::MissingField(name))
}

/// The tool service handed to the model-integration layer, one per variant.
pub enum ToolService {
    Quiz(QuizToolService),
    Editor(EditorToolService),
}

/// Everything the orchestrator needs to run one session.
pub struct PreparedSession {
    pub behavior: BehaviorKind,
    pub greeting: &'static str,
    pub session: Arc<Mutex<SessionState>>,
    pub tools: ToolService,
}

/// Builds the session state (seeded with the variant's system instructions),
/// the variant tool service, and the opening utterance.
pub fn prepare_session(
    metadata: &SessionMetadata,
    progress: Arc<ProgressClient>,
) -> PreparedSession {
    let (instructions, greeting) = match metadata.behavior {
        BehaviorKind::Quiz => (QUIZ_INSTRUCTIONS, QUIZ_GREETING),
        BehaviorKind::Editor => (EDITOR_INSTRUCTIONS, EDITOR_GREETING),
    };

    let mut state = SessionState::new(&metadata.topic_id, &metadata.user_id);
    state.push_turn(TurnRole::System, instructions);
    let session = Arc::new(Mutex::new(state));

    let tools = match metadata.behavior {
        BehaviorKind::Quiz => {
            ToolService::Quiz(QuizToolService::new(session.clone(), progress))
        }
        BehaviorKind::Editor => ToolService::Editor(EditorToolService::new()),
    };

    PreparedSession {
        behavior: metadata.behavior,
        greeting,
        session,
        tools,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz_metadata() -> serde_json::Value {
        json!({ "behaviorType": "quiz", "topicId": "t1", "userId": "u1" })
    }

    #[test]
    fn recognized_variants_dispatch() {
        let quiz = SessionMetadata::from_value(quiz_metadata()).unwrap();
        assert_eq!(quiz.behavior, BehaviorKind::Quiz);
        assert_eq!(quiz.topic_id, "t1");
        assert_eq!(quiz.user_id, "u1");

        let editor = SessionMetadata::from_value(
            json!({ "behaviorType": "editor", "topicId": "doc-7", "userId": "u2" }),
        )
        .unwrap();
        assert_eq!(editor.behavior, BehaviorKind::Editor);
    }

    #[test]
    fn missing_fields_are_fatal() {
        for field in ["behaviorType", "topicId", "userId"] {
            let mut value = quiz_metadata();
            value.as_object_mut().unwrap().remove(field);
            let err = SessionMetadata::from_value(value).unwrap_err();
            match err {
                MetadataError::MissingField(name) => assert_eq!(name, field),
                other => panic!("expected MissingField for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_fields_count_as_missing() {
        let mut value = quiz_metadata();
        value.as_object_mut().unwrap()["userId"] = json!("");
        let err = SessionMetadata::from_value(value).unwrap_err();
        assert!(matches!(err, MetadataError::MissingField("userId")));
    }

    #[test]
    fn unknown_behavior_is_fatal() {
        let mut value = quiz_metadata();
        value.as_object_mut().unwrap()["behaviorType"] = json!("karaoke");
        let err = SessionMetadata::from_value(value).unwrap_err();
        match err {
            MetadataError::UnknownBehavior(name) => assert_eq!(name, "karaoke"),
            other => panic!("expected UnknownBehavior, got {other:?}"),
        }
    }

    #[test]
    fn non_object_metadata_is_fatal() {
        let err = SessionMetadata::from_value(json!("quiz")).unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
    }

    #[tokio::test]
    async fn quiz_session_is_seeded_with_instructions_and_quiz_tools() {
        let metadata = SessionMetadata::from_value(quiz_metadata()).unwrap();
        let progress = Arc::new(ProgressClient::new("http://localhost:0").unwrap());
        let prepared = prepare_session(&metadata, progress);

        assert_eq!(prepared.behavior, BehaviorKind::Quiz);
        assert_eq!(prepared.greeting, QUIZ_GREETING);
        assert!(matches!(prepared.tools, ToolService::Quiz(_)));

        let state = prepared.session.lock().await;
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].role, TurnRole::System);
        assert!(state.history[0].text.contains("get_next_due_card"));
        assert!(state.active_card.is_none());
    }

    #[tokio::test]
    async fn editor_session_gets_editor_tools_and_greeting() {
        let metadata = SessionMetadata::from_value(
            json!({ "behaviorType": "editor", "topicId": "doc-7", "userId": "u2" }),
        )
        .unwrap();
        let progress = Arc::new(ProgressClient::new("http://localhost:0").unwrap());
        let prepared = prepare_session(&metadata, progress);

        assert_eq!(prepared.greeting, EDITOR_GREETING);
        assert!(matches!(prepared.tools, ToolService::Editor(_)));

        let state = prepared.session.lock().await;
        assert!(state.history[0].text.contains("document"));
    }
}
