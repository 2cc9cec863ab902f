//! HTTP client for the external flashcard progress service.
//!
//! A stateless request/response mapping: each call is a fresh, uncorrelated
//! request with no retry and no deduplication. The underlying client carries
//! a bounded timeout so a stalled service cannot hang a conversation turn.

use crate::session::Flashcard;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures below the HTTP status level: connect errors, timeouts, and
/// bodies that do not parse.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("progress service request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Grade for a reviewed card. The progress service accepts exactly two
/// values: "1" (wrong or no answer) and "3" (correct).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rating {
    Incorrect,
    Correct,
}

impl Rating {
    pub fn as_wire(self) -> &'static str {
        match self {
            Rating::Incorrect => "1",
            Rating::Correct => "3",
        }
    }

    /// Parses the wire form; anything outside the two-valued domain is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Rating::Incorrect),
            "3" => Some(Rating::Correct),
            _ => None,
        }
    }
}

/// Outcome of asking the service for the next due card.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Found(Flashcard),
    /// Nothing is scheduled for review right now.
    Empty,
    /// The service answered with an error status; the body text is kept for
    /// the model to relay.
    Failed(String),
}

/// Outcome of submitting a review.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResult {
    Accepted,
    Rejected(String),
}

#[derive(Deserialize)]
struct QuestionBody {
    #[serde(rename = "_id")]
    id: String,
    content: String,
}

#[derive(Deserialize)]
struct AnswerBody {
    content: String,
}

#[derive(Deserialize)]
struct NextQuestionBody {
    question: QuestionBody,
    answer: Option<AnswerBody>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody<'a> {
    user_id: &'a str,
    question_id: &'a str,
    performance_rating: &'a str,
    user_answer: &'a str,
    topic_id: &'a str,
}

/// Client for the progress-tracking service, addressed to a base URL fixed
/// at construction.
pub struct ProgressClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProgressClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProgressError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Asks the service for the next card due for review.
    pub async fn fetch_next_due(
        &self,
        user_id: &str,
        topic_id: &str,
    ) -> Result<FetchResult, ProgressError> {
        let url = format!("{}/getNextQuestion", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("userId", user_id), ("topicId", topic_id)])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: NextQuestionBody = response.json().await?;
                let card = Flashcard {
                    id: body.question.id,
                    prompt: body.question.content,
                    reference_answer: body.answer.map(|a| a.content),
                };
                info!(card_id = %card.id, "Fetched next due card.");
                Ok(FetchResult::Found(card))
            }
            StatusCode::NOT_FOUND => Ok(FetchResult::Empty),
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(%status, %message, "Progress service rejected fetch.");
                Ok(FetchResult::Failed(message))
            }
        }
    }

    /// Submits one review for one card. No retry: a duplicate submission is
    /// indistinguishable from a new one on the service side.
    pub async fn submit_review(
        &self,
        user_id: &str,
        topic_id: &str,
        card_id: &str,
        rating: Rating,
        user_answer: &str,
    ) -> Result<SubmitResult, ProgressError> {
        let url = format!("{}/updateFlashcardProgress", self.base_url);
        let body = ReviewBody {
            user_id,
            question_id: card_id,
            performance_rating: rating.as_wire(),
            user_answer,
            topic_id,
        };
        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if status.is_success() {
            info!(%card_id, rating = rating.as_wire(), "Review recorded.");
            Ok(SubmitResult::Accepted)
        } else {
            let message = response.text().await.unwrap_or_default();
            warn!(%status, %message, "Progress service rejected review.");
            Ok(SubmitResult::Rejected(message))
        }
    }
}
