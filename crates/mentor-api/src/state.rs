//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use mentor_chat::ChatOrchestrator;
use mentor_memory::MemoryGateway;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatOrchestrator>,
    /// Same store the orchestrator writes to, for the memory endpoints.
    pub memory: Arc<dyn MemoryGateway>,
    /// Bearer token required on protected routes.
    pub api_token: String,
    /// Port the server is bound to, used for the CORS allow list.
    pub port: u16,
    pub started_at: DateTime<Utc>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(chat: Arc<ChatOrchestrator>, api_token: impl Into<String>, port: u16) -> Self {
        Self {
            memory: Arc::clone(chat.memory()),
            chat,
            api_token: api_token.into(),
            port,
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }
}
