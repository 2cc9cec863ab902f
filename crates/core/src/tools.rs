//! Tool services exposed to the language model.
//!
//! Each behavior variant gets its own MCP service. The router built in
//! `new()` is the complete tool registry for one session: the turn loop
//! lists it once as plain data (name, description, parameter schema) and
//! forwards every model-issued call here. Handlers read and mutate the
//! shared `SessionState` and talk to the progress service; they never touch
//! the transport.

use crate::progress::{FetchResult, ProgressClient, Rating, SubmitResult};
use crate::session::SessionState;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Fixed reply when the service has nothing scheduled for review.
pub const NO_CARDS_DUE: &str = "There are no flashcards due at the moment.";

/// Outcome of a tool invocation.
///
/// `Success` and `Recoverable` both flow back to the model as text: a
/// recoverable message is spoken to the user and the session continues.
/// `Fatal` becomes a tool-protocol error, which the turn loop escalates to
/// session failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(String),
    Recoverable(String),
    Fatal(String),
}

impl ToolResult {
    /// Collapses the outcome into the shape the tool router returns.
    pub fn into_response(self) -> Result<String, String> {
        match self {
            ToolResult::Success(text) | ToolResult::Recoverable(text) => Ok(text),
            ToolResult::Fatal(reason) => Err(reason),
        }
    }
}

/// Arguments for recording the user's performance on the active card.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct UpdateCardProgressArgs {
    /// Grade for the user's answer.
    #[schemars(
        description = "Performance rating for the user's answer: '1' (wrong or no answer) or '3' (correct)"
    )]
    pub performance_rating: String,
    /// What the user actually said.
    #[schemars(description = "The user's answer to the flashcard question, verbatim")]
    pub user_answer: String,
}

/// Tool service for the quiz behavior.
///
/// Two states: idle (no active card) and card-presented. A successful fetch
/// presents a card; an accepted review returns to idle; a rejected review
/// leaves the card in place so the model can retry.
pub struct QuizToolService {
    session: Arc<Mutex<SessionState>>,
    progress: Arc<ProgressClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for QuizToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl QuizToolService {
    pub fn new(session: Arc<Mutex<SessionState>>, progress: Arc<ProgressClient>) -> Self {
        Self {
            session,
            progress,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Fetch the next due flashcard for the user. Returns the question and, when available, the reference answer."
    )]
    pub async fn get_next_due_card(&self) -> Result<String, String> {
        self.fetch_next_due_card().await.into_response()
    }

    #[tool(
        description = "Record the user's performance on the current flashcard: '1' = wrong or no answer, '3' = correct."
    )]
    pub async fn update_card_progress(
        &self,
        args: Parameters<UpdateCardProgressArgs>,
    ) -> Result<String, String> {
        self.record_review(&args.0.performance_rating, &args.0.user_answer)
            .await
            .into_response()
    }

    /// Fetches the next card and, on success, makes it the active card.
    pub async fn fetch_next_due_card(&self) -> ToolResult {
        info!("Executing tool 'get_next_due_card'");
        let (user_id, topic_id) = {
            let session = self.session.lock().await;
            (session.user_id.clone(), session.topic_id.clone())
        };

        match self.progress.fetch_next_due(&user_id, &topic_id).await {
            Ok(FetchResult::Found(card)) => {
                let text = match &card.reference_answer {
                    Some(answer) => format!("Question: {} (Answer: {})", card.prompt, answer),
                    None => format!("Question: {}", card.prompt),
                };
                self.session.lock().await.active_card = Some(card);
                ToolResult::Success(text)
            }
            Ok(FetchResult::Empty) => ToolResult::Success(NO_CARDS_DUE.to_string()),
            Ok(FetchResult::Failed(message)) => ToolResult::Recoverable(format!(
                "Could not fetch the next flashcard: {message}"
            )),
            Err(e) => {
                warn!(error = %e, "Progress service unreachable during fetch.");
                ToolResult::Recoverable(format!("Could not reach the progress service: {e}"))
            }
        }
    }

    /// Submits a review for the active card. An accepted submission clears
    /// the card; anything else leaves state untouched.
    pub async fn record_review(&self, rating: &str, user_answer: &str) -> ToolResult {
        info!(%rating, "Executing tool 'update_card_progress'");
        let Some(rating) = Rating::parse(rating) else {
            return ToolResult::Recoverable(format!(
                "Invalid performance rating '{rating}': expected '1' or '3'."
            ));
        };

        let (user_id, topic_id, card_id) = {
            let session = self.session.lock().await;
            let Some(card) = &session.active_card else {
                return ToolResult::Recoverable(
                    "There is no active flashcard to grade. Fetch the next card first."
                        .to_string(),
                );
            };
            (
                session.user_id.clone(),
                session.topic_id.clone(),
                card.id.clone(),
            )
        };

        match self
            .progress
            .submit_review(&user_id, &topic_id, &card_id, rating, user_answer)
            .await
        {
            Ok(SubmitResult::Accepted) => {
                self.session.lock().await.active_card = None;
                ToolResult::Success("Flashcard progress recorded.".to_string())
            }
            Ok(SubmitResult::Rejected(message)) => {
                ToolResult::Recoverable(format!("Could not record progress: {message}"))
            }
            Err(e) => {
                warn!(error = %e, "Progress service unreachable during review.");
                ToolResult::Recoverable(format!("Could not reach the progress service: {e}"))
            }
        }
    }
}

/// Tool service for the editor behavior.
///
/// The editor assistant converses but declares no callable tools, so its
/// router is empty; it exists so the model-integration layer is uniform
/// across behavior variants.
pub struct EditorToolService {
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for EditorToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl EditorToolService {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for EditorToolService {
    fn default() -> Self {
        Self::new()
    }
}
