//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path and body parameters via axum extractors,
//! calls the orchestrator or the memory store, and returns JSON.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_chat::{ReplyMetadata, SessionSummary};
use mentor_core::types::{DeleteTarget, MemoryFact, Turn};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

/// Body for POST /chat.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

/// Body for PUT /memories/{owner}/{fact_id}.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateMemoryRequest {
    pub text: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub completion: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    pub metadata: ReplyMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoriesResponse {
    pub owner_id: String,
    pub facts: Vec<MemoryFact>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemovedResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearedResponse {
    pub session_id: String,
    pub cleared: bool,
}

// =============================================================================
// Handler functions
// =============================================================================

/// GET /health - liveness and backend summary.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: state.started_at,
        uptime_secs: state.start_time.elapsed().as_secs(),
        completion: state.chat.completion_name().to_string(),
    })
}

/// POST /chat - handle one utterance.
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let reply = state
        .chat
        .handle_utterance(&body.session_id, &body.message)
        .await?;
    Ok(Json(ChatResponse {
        session_id: body.session_id,
        reply: reply.text,
        metadata: reply.metadata,
    }))
}

/// GET /sessions - every live session.
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.chat.list_sessions().await,
    })
}

/// GET /sessions/{id}/history - full transcript.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state
        .chat
        .history(&id)
        .await
        .ok_or_else(|| session_not_found(&id))?;
    Ok(Json(HistoryResponse {
        session_id: id,
        turns,
    }))
}

/// DELETE /sessions/{id}/history - empty the transcript, keep memories.
pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClearedResponse>, ApiError> {
    if !state.chat.clear_history(&id).await {
        return Err(session_not_found(&id));
    }
    Ok(Json(ClearedResponse {
        session_id: id,
        cleared: true,
    }))
}

/// POST /sessions/{id}/reset - clear the transcript and every memory.
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.chat.reset(&id).await?;
    Ok(Json(RemovedResponse { removed }))
}

/// GET /memories/{owner} - all facts, newest first.
pub async fn list_memories(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<MemoriesResponse>, ApiError> {
    let facts = state.memory.list(&owner).await?;
    Ok(Json(MemoriesResponse {
        owner_id: owner,
        facts,
    }))
}

/// DELETE /memories/{owner} - forget everything about the owner.
pub async fn delete_all_memories(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.memory.delete(&owner, DeleteTarget::All).await?;
    tracing::info!(owner = %owner, removed, "Memories deleted via API");
    Ok(Json(RemovedResponse { removed }))
}

/// PUT /memories/{owner}/{fact_id} - replace a fact's text.
pub async fn update_memory(
    State(state): State<AppState>,
    Path((owner, fact_id)): Path<(String, String)>,
    Json(body): Json<UpdateMemoryRequest>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let id = parse_fact_id(&fact_id)?;
    let text = body.text.trim();
    state.memory.update(&owner, id, text).await?;
    Ok(Json(UpdatedResponse {
        id,
        text: text.to_string(),
    }))
}

/// DELETE /memories/{owner}/{fact_id} - forget one fact.
pub async fn delete_memory(
    State(state): State<AppState>,
    Path((owner, fact_id)): Path<(String, String)>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let id = parse_fact_id(&fact_id)?;
    match state.memory.delete(&owner, DeleteTarget::Fact(id)).await? {
        0 => Err(ApiError::NotFound(format!("Memory '{}' not found", id))),
        removed => Ok(Json(RemovedResponse { removed })),
    }
}

fn parse_fact_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid memory id '{}'", raw)))
}

fn session_not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Session '{}' not found", id))
}
