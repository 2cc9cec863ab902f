//! Administrative client for the room server.
//!
//! One operation: deleting a room once its session has ended. Callers treat
//! the call as best-effort; the error type exists so they can log what went
//! wrong, not so they can react to it.

use reqwest::StatusCode;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RoomAdminError {
    #[error("room admin request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("room admin returned {status}: {message}")]
    Rejected { status: StatusCode, message: String },
}

pub struct RoomAdminClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RoomAdminClient {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, RoomAdminError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Deletes a room on the room server.
    pub async fn delete_room(&self, room: &str) -> Result<(), RoomAdminError> {
        let url = format!("{}/rooms/{}", self.base_url, room);
        let mut request = self.http.delete(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RoomAdminError::Rejected {
                status,
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}
