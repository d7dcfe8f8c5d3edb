//! Recording gateways for orchestrator tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use mentor_calendar::{normalize_events, CalendarGateway};
use mentor_core::error::{MentorError, Result};
use mentor_core::types::{CalendarEvent, DeleteTarget, MemoryFact, TimeRange};
use mentor_llm::{CompletionGateway, PromptContext};
use mentor_memory::{MemoryGateway, SqliteMemoryStore};

type Failure = fn(String) -> MentorError;

/// Gateway calls across fakes, in the order they happened.
pub type Journal = Arc<Mutex<Vec<&'static str>>>;

fn log(journal: &Option<Journal>, call: &'static str) {
    if let Some(journal) = journal {
        journal.lock().unwrap().push(call);
    }
}

// ---- Memory ----

/// In-memory SQLite store that counts calls and can be switched off.
pub struct RecordingMemory {
    inner: SqliteMemoryStore,
    pub fail_with: Mutex<Option<Failure>>,
    pub adds: Mutex<Vec<(String, String)>>,
    pub queries: AtomicUsize,
    pub deletes: AtomicUsize,
    journal: Option<Journal>,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self {
            inner: SqliteMemoryStore::in_memory().unwrap(),
            fail_with: Mutex::new(None),
            adds: Mutex::new(Vec::new()),
            queries: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            journal: None,
        }
    }

    pub fn journaled(journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::new()
        }
    }

    pub fn failing(failure: Failure) -> Self {
        let memory = Self::new();
        *memory.fail_with.lock().unwrap() = Some(failure);
        memory
    }

    pub fn calls(&self) -> usize {
        self.adds.lock().unwrap().len()
            + self.queries.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        match *self.fail_with.lock().unwrap() {
            Some(failure) => Err(failure("memory switched off".to_string())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MemoryGateway for RecordingMemory {
    async fn add(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Uuid> {
        log(&self.journal, "memory.add");
        self.adds
            .lock()
            .unwrap()
            .push((owner_id.to_string(), text.to_string()));
        self.check()?;
        self.inner.add(owner_id, text, metadata).await
    }

    async fn query(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryFact>> {
        log(&self.journal, "memory.query");
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.query(owner_id, query, top_k).await
    }

    async fn update(&self, owner_id: &str, id: Uuid, text: &str) -> Result<()> {
        self.check()?;
        self.inner.update(owner_id, id, text).await
    }

    async fn delete(&self, owner_id: &str, target: DeleteTarget) -> Result<usize> {
        log(&self.journal, "memory.delete");
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(owner_id, target).await
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<MemoryFact>> {
        self.check()?;
        self.inner.list(owner_id).await
    }
}

// ---- Calendar ----

/// Fixed event list, filtered by the requested range like a real provider.
pub struct RecordingCalendar {
    events: Vec<CalendarEvent>,
    pub fail_with: Option<Failure>,
    pub ranges: Mutex<Vec<TimeRange>>,
    journal: Option<Journal>,
}

impl RecordingCalendar {
    pub fn new(events: Vec<CalendarEvent>) -> Self {
        Self {
            events,
            fail_with: None,
            ranges: Mutex::new(Vec::new()),
            journal: None,
        }
    }

    pub fn journaled(events: Vec<CalendarEvent>, journal: Journal) -> Self {
        Self {
            journal: Some(journal),
            ..Self::new(events)
        }
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            fail_with: Some(failure),
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.ranges.lock().unwrap().len()
    }
}

#[async_trait]
impl CalendarGateway for RecordingCalendar {
    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>> {
        log(&self.journal, "calendar.list");
        self.ranges.lock().unwrap().push(range);
        if let Some(failure) = self.fail_with {
            return Err(failure("calendar switched off".to_string()));
        }
        Ok(normalize_events(self.events.clone(), range))
    }
}

// ---- Completion ----

/// Replies with a fixed text, or fails every call.
pub struct RecordingCompletion {
    reply: Option<String>,
    offline: bool,
    pub contexts: Mutex<Vec<PromptContext>>,
}

impl RecordingCompletion {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            offline: false,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            offline: false,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Fails like `failing`, and says up front that no model is configured.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::failing()
        }
    }

    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<PromptContext> {
        self.contexts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionGateway for RecordingCompletion {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_offline(&self) -> bool {
        self.offline
    }

    async fn complete(&self, context: &PromptContext) -> Result<String> {
        self.contexts.lock().unwrap().push(context.clone());
        self.reply
            .clone()
            .ok_or_else(|| MentorError::CompletionFailed("scripted failure".to_string()))
    }
}
