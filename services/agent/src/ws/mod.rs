//! WebSocket Session Management
//!
//! This module contains the core logic for running assistant sessions over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format between the transport
//!   edge and this service.
//! - `session`: Manages the session lifecycle, from the join handshake to
//!   teardown.
//! - `cycle`: Implements the per-turn reason/act logic that lets the model
//!   call tools before answering.

mod cycle;
pub mod protocol;
pub mod session;

pub use session::ws_handler;
