//! HTTP API server for external control (portal front-end)
//!
//! This module provides a REST API for driving call sessions:
//! - POST /calls/start - Start a new call
//! - POST /calls/:id/say - Inject a typed utterance
//! - POST /calls/:id/end - End a call
//! - GET /calls/:id/status - Query call status
//! - GET /calls/:id/transcript - Get the conversation transcript
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
