//! Manages the lifecycle of one assistant session over a WebSocket.
//!
//! A session starts when the transport edge joins a room with participant
//! metadata, lives as long as the socket, and ends with a best-effort room
//! deletion. The loop in `run_session` is the sole writer of the session
//! transcript: spoken turns and side-channel injections are both appended
//! here, in arrival order.

use super::{
    cycle::handle_turn,
    protocol::{ClientMessage, ServerMessage},
};
use crate::{room::RoomAdminClient, state::AppState};
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use rmcp::ServiceExt;
use std::sync::Arc;
use tiro_core::{
    dispatch::{self, PreparedSession, SessionMetadata, ToolService},
    session::{SessionState, TurnRole},
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tracing::{Instrument, error, info, instrument, warn};

/// Capacity of the side-channel queue feeding one session.
const SIDE_CHANNEL_CAPACITY: usize = 32;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection.
///
/// Performs the join handshake (metadata validation happens here, before any
/// external call), registers the room's side channel, and spawns the session
/// loop. A failed handshake is reported on the socket and the connection is
/// dropped without starting anything.
#[instrument(name = "ws_session", skip_all, fields(session_id, room))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let temp_id: u32 = rand::random();
    tracing::Span::current().record("session_id", temp_id.to_string());
    info!("New WebSocket connection. Awaiting join...");

    let (mut socket_tx, mut socket_rx) = socket.split();

    let (room, metadata) = match await_join(&mut socket_rx).await {
        Ok(Some(join)) => join,
        Ok(None) => {
            info!("Client disconnected before joining.");
            return;
        }
        Err(e) => {
            warn!(error = ?e, "Join handshake failed.");
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };
    tracing::Span::current().record("room", room.as_str());

    // Register the side channel before the loop starts so REST producers can
    // reach the session for its whole lifetime. One session per room.
    let (side_tx, side_rx) = mpsc::channel(SIDE_CHANNEL_CAPACITY);
    {
        let mut rooms = state.rooms.lock().await;
        if rooms.contains_key(&room) {
            warn!("Rejecting join: room already has an active session.");
            let _ = send_msg(
                &mut socket_tx,
                ServerMessage::Error {
                    message: format!("room '{room}' already has an active session"),
                },
            )
            .await;
            return;
        }
        rooms.insert(room.clone(), side_tx);
    }

    let prepared = dispatch::prepare_session(&metadata, state.progress.clone());

    if send_msg(
        &mut socket_tx,
        ServerMessage::Joined { room: room.clone() },
    )
    .await
    .is_err()
    {
        error!("Failed to confirm join to client.");
        state.rooms.lock().await.remove(&room);
        return;
    }

    let session_span = tracing::info_span!("session_runtime", %room, behavior = %prepared.behavior);
    tokio::spawn(
        async move {
            if let Err(e) = run_session(&state, socket_tx, socket_rx, prepared, side_rx).await {
                error!(error = ?e, "Session terminated with error.");
            }
            // Teardown runs exactly once, whether the loop ended cleanly or
            // not. Room deletion is fire-and-forget: nothing waits on it and
            // its failure never escalates.
            state.rooms.lock().await.remove(&room);
            spawn_room_cleanup(state.room_admin.clone(), room);
            info!("Session finished.");
        }
        .instrument(session_span),
    );
}

/// Waits for the mandatory `join` frame and validates the metadata in it.
async fn await_join(
    socket_rx: &mut SplitStream<WebSocket>,
) -> Result<Option<(String, SessionMetadata)>> {
    let Some(first) = socket_rx.next().await else {
        return Ok(None);
    };
    let ws_msg = first.context("error receiving join frame")?;
    let Message::Text(text) = ws_msg else {
        return Err(anyhow!("first message must be a text `join` frame"));
    };
    let msg: ClientMessage =
        serde_json::from_str(&text).context("malformed join frame")?;
    let ClientMessage::Join { room, metadata } = msg else {
        return Err(anyhow!("first message must be `join`"));
    };
    let metadata = SessionMetadata::from_value(metadata)?;
    Ok(Some((room, metadata)))
}

/// The main event loop for an active session.
async fn run_session(
    state: &Arc<AppState>,
    mut socket_tx: SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
    prepared: PreparedSession,
    mut side_rx: mpsc::Receiver<String>,
) -> Result<()> {
    let PreparedSession {
        greeting,
        session,
        tools,
        ..
    } = prepared;

    // Serve the session's tool service over an in-process duplex transport
    // and connect the client half the turn loop calls through.
    let (server_transport, client_transport) = tokio::io::duplex(4096);
    let tool_handle: JoinHandle<()> = tokio::spawn(async move {
        match tools {
            ToolService::Quiz(service) => {
                if let Ok(running) = service.serve(server_transport).await {
                    let _ = running.waiting().await;
                }
            }
            ToolService::Editor(service) => {
                if let Ok(running) = service.serve(server_transport).await {
                    let _ = running.waiting().await;
                }
            }
        }
    });
    let mcp_client = ().serve(client_transport).await?;

    // The session opens by speaking; the greeting is part of the transcript.
    session.lock().await.push_turn(TurnRole::Assistant, greeting);
    send_msg(
        &mut socket_tx,
        ServerMessage::Say {
            text: greeting.to_string(),
        },
    )
    .await?;

    loop {
        tokio::select! {
            maybe_msg = socket_rx.next() => {
                let Some(msg_result) = maybe_msg else { break };
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Utterance { text }) => {
                            if let Some(reply) =
                                handle_turn(&state.llm_client, &session, &mcp_client, &text).await?
                            {
                                send_msg(&mut socket_tx, ServerMessage::Say { text: reply }).await?;
                            }
                        }
                        Ok(ClientMessage::Join { .. }) => {
                            warn!("Ignoring `join` frame after session start.");
                        }
                        Err(e) => warn!(error = ?e, "Ignoring malformed client frame."),
                    },
                    Ok(Message::Binary(_)) => {
                        warn!("Ignoring binary frame: audio never reaches this service.");
                    }
                    Ok(Message::Close(_)) => {
                        info!("Client sent close frame. Shutting down session.");
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Err(e) => {
                        error!(error = ?e, "Error receiving from client socket.");
                        break;
                    }
                }
            },
            // Side-channel messages become user turns in arrival order. This
            // loop is the only writer of the transcript, so injected text can
            // never interleave inside another append.
            maybe_text = side_rx.recv() => {
                let Some(text) = maybe_text else { break };
                inject_side_message(&session, text).await;
            },
        }
    }

    tool_handle.abort();
    info!("Socket closed and session loop exited.");
    Ok(())
}

/// Appends one side-channel message to the transcript as a user turn.
async fn inject_side_message(session: &Arc<Mutex<SessionState>>, text: String) {
    info!("Injecting side-channel message into conversation.");
    session.lock().await.push_turn(TurnRole::User, text);
}

/// Best-effort room deletion after session end. Spawned, never awaited by
/// the session; failures are logged and stop there.
pub(crate) fn spawn_room_cleanup(admin: Arc<RoomAdminClient>, room: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        match admin.delete_room(&room).await {
            Ok(()) => info!(%room, "Room deleted after session end."),
            Err(e) => error!(%room, error = ?e, "Failed to delete room after session end."),
        }
    })
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn room_cleanup_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rooms/study-42"))
            .respond_with(ResponseTemplate::new(500).set_body_string("room server down"))
            .expect(1)
            .mount(&server)
            .await;

        let admin = Arc::new(RoomAdminClient::new(server.uri(), None).unwrap());
        let handle = spawn_room_cleanup(admin, "study-42".to_string());

        // The cleanup task must finish without panicking even though the
        // deletion failed.
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn room_cleanup_deletes_the_room() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rooms/study-42"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let admin = Arc::new(RoomAdminClient::new(server.uri(), None).unwrap());
        spawn_room_cleanup(admin, "study-42".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn side_channel_messages_append_in_arrival_order() {
        let session = Arc::new(Mutex::new(SessionState::new("t1", "u1")));
        session
            .lock()
            .await
            .push_turn(TurnRole::Assistant, "turn in flight");

        let (tx, mut rx) = mpsc::channel::<String>(SIDE_CHANNEL_CAPACITY);
        // Two producers; arrival order is fixed by awaiting the first send
        // before issuing the second.
        tx.send("first note".to_string()).await.unwrap();
        let tx2 = tx.clone();
        tx2.send("second note".to_string()).await.unwrap();
        drop(tx);
        drop(tx2);

        // The session loop is the sole consumer; replicate its drain arm.
        while let Some(text) = rx.recv().await {
            inject_side_message(&session, text).await;
        }

        let state = session.lock().await;
        let transcript: Vec<_> = state
            .history
            .iter()
            .map(|t| (t.role, t.text.as_str()))
            .collect();
        assert_eq!(
            transcript,
            vec![
                (TurnRole::Assistant, "turn in flight"),
                (TurnRole::User, "first note"),
                (TurnRole::User, "second note"),
            ]
        );
    }
}
