//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the service: the
//! session WebSocket, the side-channel REST endpoints, and the OpenAPI
//! documentation.

use crate::{
    handlers,
    handlers::{ErrorResponse, InjectMessagePayload, RoomList},
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::inject_room_message, handlers::list_rooms),
    components(schemas(InjectMessagePayload, RoomList, ErrorResponse)),
    tags(
        (name = "Tiro Agent API", description = "Side channel and room registry for the tiro voice assistant")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the service.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/rooms", get(handlers::list_rooms))
        .route("/rooms/{room}/messages", post(handlers::inject_room_message))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    // Merge the stateful routes with the stateless Swagger UI.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
