//! Session transcripts and the registry that owns them.
//!
//! A session is keyed by the student's id and holds an append-only list of
//! turns. Each session sits behind its own async lock so one session's turns
//! run strictly in order while different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use mentor_core::types::Turn;

use crate::types::SessionSummary;

// =============================================================================
// Session
// =============================================================================

/// One student's conversation.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a turn, keeping the transcript ordered by timestamp.
    pub fn append(&mut self, mut turn: Turn) {
        if let Some(last) = self.turns.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        self.last_activity = Utc::now();
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Turn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns[skip..].to_vec()
    }

    /// Empty the transcript in one step.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.last_activity = Utc::now();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            turn_count: self.turns.len(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

// =============================================================================
// SessionRegistry
// =============================================================================

pub type SessionHandle = Arc<AsyncMutex<Session>>;

/// All live sessions for this process.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        // A panic while holding the map lock cannot leave the map half-updated.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The session for `id`, created on first use.
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        self.map()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(id))))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.map().get(id).cloned()
    }

    /// Full transcript, or `None` for an unknown session.
    pub async fn history(&self, id: &str) -> Option<Vec<Turn>> {
        let handle = self.get(id)?;
        let session = handle.lock().await;
        Some(session.turns().to_vec())
    }

    /// Clear a session's transcript. Returns whether the session existed.
    pub async fn clear(&self, id: &str) -> bool {
        match self.get(id) {
            Some(handle) => {
                handle.lock().await.clear();
                true
            }
            None => false,
        }
    }

    /// Summaries of every session, ordered by id.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self.map().values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
