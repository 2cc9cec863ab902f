//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources: the configuration, the LLM client, the progress and
//! room-admin clients, and the registry of active room sessions.

use crate::config::Config;
use crate::room::RoomAdminClient;
use std::collections::HashMap;
use std::sync::Arc;
use tiro_core::{llm_client::LLMClient, progress::ProgressClient};
use tokio::sync::{Mutex, mpsc};

/// Sender half of one session's side channel. REST handlers push text into
/// it; the session loop is the sole consumer and drains it into the
/// conversation in arrival order.
pub type SideChannelSender = mpsc::Sender<String>;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm_client: Arc<dyn LLMClient>,
    pub progress: Arc<ProgressClient>,
    pub room_admin: Arc<RoomAdminClient>,
    /// Active sessions keyed by room name.
    pub rooms: Arc<Mutex<HashMap<String, SideChannelSender>>>,
}
