//! Axum Handlers for the REST API
//!
//! The REST surface is deliberately small: a side-channel endpoint that
//! injects text into a live session's conversation, and a listing of active
//! rooms. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::error;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unavailable(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Unavailable(message) => {
                (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Deserialize, ToSchema)]
pub struct InjectMessagePayload {
    /// Text to append to the conversation as a user turn.
    #[schema(example = "The user highlighted the second paragraph.")]
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct RoomList {
    pub rooms: Vec<String>,
}

/// Inject a text message into a live session's conversation.
///
/// The message is queued on the session's side channel and appended as a
/// user turn by the session loop, in arrival order.
#[utoipa::path(
    post,
    path = "/rooms/{room}/messages",
    request_body = InjectMessagePayload,
    params(
        ("room" = String, Path, description = "Room name of the target session")
    ),
    responses(
        (status = 202, description = "Message queued for the session"),
        (status = 404, description = "No active session for this room", body = ErrorResponse),
        (status = 503, description = "Side channel is full", body = ErrorResponse)
    )
)]
pub async fn inject_room_message(
    State(state): State<Arc<AppState>>,
    Path(room): Path<String>,
    Json(payload): Json<InjectMessagePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let sender = state
        .rooms
        .lock()
        .await
        .get(&room)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("no active session for room '{room}'")))?;

    sender.try_send(payload.text).map_err(|e| match e {
        TrySendError::Full(_) => {
            ApiError::Unavailable(format!("side channel for room '{room}' is full"))
        }
        TrySendError::Closed(_) => {
            ApiError::NotFound(format!("session for room '{room}' has ended"))
        }
    })?;

    Ok(StatusCode::ACCEPTED)
}

/// List rooms with an active session.
#[utoipa::path(
    get,
    path = "/rooms",
    responses(
        (status = 200, description = "Active rooms", body = RoomList)
    )
)]
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<RoomList> {
    let rooms = state.rooms.lock().await.keys().cloned().collect();
    Json(RoomList { rooms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::room::RoomAdminClient;
    use async_openai::config::OpenAIConfig;
    use std::collections::HashMap;
    use tiro_core::llm_client::OpenAICompatibleClient;
    use tiro_core::progress::ProgressClient;
    use tokio::sync::{Mutex, mpsc};

    fn test_state() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            progress_service_url: "http://localhost:0".to_string(),
            room_admin_url: "http://localhost:0".to_string(),
            room_admin_token: None,
            openai_api_key: "test-key".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            log_level: tracing::Level::INFO,
        };
        Arc::new(AppState {
            config: Arc::new(config),
            llm_client: Arc::new(OpenAICompatibleClient::new(
                OpenAIConfig::new().with_api_key("test-key"),
                "gpt-4o-mini".to_string(),
            )),
            progress: Arc::new(ProgressClient::new("http://localhost:0").unwrap()),
            room_admin: Arc::new(RoomAdminClient::new("http://localhost:0", None).unwrap()),
            rooms: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    #[tokio::test]
    async fn inject_into_unknown_room_is_not_found() {
        let state = test_state();
        let response = inject_room_message(
            State(state),
            Path("ghost".to_string()),
            Json(InjectMessagePayload {
                text: "hello".to_string(),
            }),
        )
        .await;

        let err = response.err().expect("expected an error");
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inject_queues_message_for_registered_room() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(4);
        state.rooms.lock().await.insert("study-42".to_string(), tx);

        let response = inject_room_message(
            State(state),
            Path("study-42".to_string()),
            Json(InjectMessagePayload {
                text: "a note".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.into_response().status(), StatusCode::ACCEPTED);
        assert_eq!(rx.recv().await.as_deref(), Some("a note"));
    }

    #[tokio::test]
    async fn inject_into_full_side_channel_is_unavailable() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send("occupies the only slot".to_string()).unwrap();
        state.rooms.lock().await.insert("study-42".to_string(), tx);

        let response = inject_room_message(
            State(state),
            Path("study-42".to_string()),
            Json(InjectMessagePayload {
                text: "does not fit".to_string(),
            }),
        )
        .await;

        let err = response.err().expect("expected an error");
        assert_eq!(
            err.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn list_rooms_reflects_the_registry() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(1);
        state.rooms.lock().await.insert("study-42".to_string(), tx);

        let Json(body) = list_rooms(State(state)).await;
        assert_eq!(body.rooms, vec!["study-42".to_string()]);
    }
}
