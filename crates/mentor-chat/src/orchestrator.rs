//! Chat orchestrator: central coordinator wiring the classifier, the three
//! gateways, and reply composition.
//!
//! One utterance moves `RECEIVED -> CLASSIFIED -> DISPATCHED -> COMPOSED ->
//! DELIVERED`. Gateway failures never escape a turn: each one degrades the
//! reply and leaves a note in the metadata.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info, warn};

use mentor_calendar::CalendarGateway;
use mentor_core::config::ChatConfig;
use mentor_core::error::MentorError;
use mentor_core::types::{CalendarEvent, DeleteTarget, MemoryFact, TimeRange, Turn};
use mentor_llm::{CompletionGateway, GroundingBlock, PromptContext};
use mentor_memory::MemoryGateway;

use crate::classifier::{IntentClassifier, Verdict};
use crate::error::ChatError;
use crate::response::{self, CALENDAR_AUTH_PROMPT, CALENDAR_REJECTED, CALENDAR_UNAVAILABLE};
use crate::retry::{guarded, with_retry, RetryPolicy};
use crate::session::SessionRegistry;
use crate::timeframe;
use crate::types::{
    ChatReply, Classification, ForgetTarget, ReplyMetadata, Request, SessionSummary, Timeframe,
    TurnState,
};

/// What dispatching one request produced, before it becomes a reply.
#[derive(Debug, Default)]
struct Outcome {
    text: String,
    notes: Vec<String>,
    memory_count: usize,
    event_count: usize,
    completion_used: bool,
}

impl Outcome {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Central chat orchestrator.
pub struct ChatOrchestrator {
    config: ChatConfig,
    tz: Tz,
    classifier: IntentClassifier,
    policy: RetryPolicy,
    sessions: SessionRegistry,
    memory: Arc<dyn MemoryGateway>,
    calendar: Arc<dyn CalendarGateway>,
    completion: Arc<dyn CompletionGateway>,
    clock: fn() -> DateTime<Utc>,
}

impl ChatOrchestrator {
    pub fn new(
        config: ChatConfig,
        tz: Tz,
        memory: Arc<dyn MemoryGateway>,
        calendar: Arc<dyn CalendarGateway>,
        completion: Arc<dyn CompletionGateway>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(config.model_fallback),
            policy: RetryPolicy::from_config(&config),
            config,
            tz,
            sessions: SessionRegistry::new(),
            memory,
            calendar,
            completion,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used to resolve "today" and friends.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the timeout and retry pause.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn memory(&self) -> &Arc<dyn MemoryGateway> {
        &self.memory
    }

    pub fn completion_name(&self) -> &str {
        self.completion.name()
    }

    /// Handle one utterance for `session_id` and return the reply.
    ///
    /// Only caller mistakes are errors. Everything past validation reaches
    /// `DELIVERED`, with degradations recorded in the reply metadata.
    pub async fn handle_utterance(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<ChatReply, ChatError> {
        if !self.config.enabled {
            return Err(ChatError::Disabled);
        }
        if session_id.trim().is_empty() {
            return Err(ChatError::EmptySessionId);
        }
        if utterance.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let handle = self.sessions.get_or_create(session_id);
        let mut session = handle.lock().await;
        trace_state(session_id, TurnState::Received);

        let history = session.recent(self.config.history_window);
        let classification = self.classify(utterance, &history).await;
        let intent = classification.intent();
        info!(
            session = %session_id,
            intent = %intent,
            source = ?classification.source,
            "Utterance classified"
        );
        trace_state(session_id, TurnState::Classified);

        let outcome = self
            .dispatch(session_id, utterance, history, classification.request)
            .await;
        trace_state(session_id, TurnState::Dispatched);

        session.append(Turn::user(utterance.trim()));
        session.append(Turn::assistant(outcome.text.clone()));
        trace_state(session_id, TurnState::Composed);

        if !outcome.notes.is_empty() {
            warn!(session = %session_id, notes = ?outcome.notes, "Reply degraded");
        }
        trace_state(session_id, TurnState::Delivered);

        Ok(ChatReply {
            text: outcome.text,
            metadata: ReplyMetadata {
                intent,
                source: classification.source,
                state: TurnState::Delivered,
                notes: outcome.notes,
                memory_count: outcome.memory_count,
                event_count: outcome.event_count,
                completion_used: outcome.completion_used,
            },
        })
    }

    /// Full transcript of a session, `None` if it was never used.
    pub async fn history(&self, session_id: &str) -> Option<Vec<Turn>> {
        self.sessions.history(session_id).await
    }

    /// Empty a session's transcript. Memories are kept.
    pub async fn clear_history(&self, session_id: &str) -> bool {
        let cleared = self.sessions.clear(session_id).await;
        if cleared {
            info!(session = %session_id, "History cleared");
        }
        cleared
    }

    /// Clear the transcript and delete every stored memory for the owner.
    ///
    /// Returns the number of facts removed.
    /// The transcript is only cleared once the memories are gone, and no
    /// turn of the session runs in between.
    pub async fn reset(&self, session_id: &str) -> Result<usize, MentorError> {
        let handle = self.sessions.get(session_id);
        let mut session = match &handle {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };
        let removed = self.delete_memory(session_id, DeleteTarget::All).await?;
        if let Some(session) = session.as_mut() {
            session.clear();
        }
        info!(session = %session_id, removed, "Session reset");
        Ok(removed)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list().await
    }

    // -- Classification --

    async fn classify(&self, utterance: &str, history: &[Turn]) -> Classification {
        match self.classifier.classify(utterance) {
            Verdict::Decided(classification) => classification,
            Verdict::AskModel if self.completion.is_offline() => {
                self.classifier.from_model_reply(utterance, None)
            }
            Verdict::AskModel => {
                let prompt = self.classifier.model_prompt(utterance, history);
                let reply = guarded(
                    &self.policy,
                    "intent classification",
                    MentorError::CompletionFailed,
                    self.completion.complete(&prompt),
                )
                .await;
                match reply {
                    Ok(text) => self.classifier.from_model_reply(utterance, Some(&text)),
                    Err(e) => {
                        warn!(error = %e, "Model classification failed, treating as chat");
                        self.classifier.from_model_reply(utterance, None)
                    }
                }
            }
        }
    }

    // -- Dispatch --

    async fn dispatch(
        &self,
        owner: &str,
        utterance: &str,
        history: Vec<Turn>,
        request: Request,
    ) -> Outcome {
        match request {
            Request::Remember { fact } => self.remember(owner, utterance, history, &fact).await,
            Request::Recall { query } => self.recall(owner, utterance, history, &query).await,
            Request::Forget { target } => self.forget(owner, target).await,
            Request::Calendar { timeframe } => {
                self.calendar_query(utterance, history, &timeframe).await
            }
            Request::Compound {
                query,
                timeframe,
                fact,
            } => {
                self.compound(owner, utterance, history, &query, &timeframe, fact.as_deref())
                    .await
            }
            Request::Chat {
                clarify: Some(question),
            } => Outcome::text(question),
            Request::Chat { clarify: None } => {
                self.general_chat(response::chat_prompt(utterance, history, Vec::new()))
                    .await
            }
        }
    }

    async fn remember(
        &self,
        owner: &str,
        utterance: &str,
        history: Vec<Turn>,
        fact: &str,
    ) -> Outcome {
        match self.add_fact(owner, fact).await {
            Ok(()) => {
                let prompt = response::remember_prompt(fact, utterance, history);
                let mut outcome = match self.complete(&prompt).await {
                    Some(text) => Outcome {
                        text,
                        completion_used: true,
                        ..Outcome::default()
                    },
                    None => Outcome::text(response::remember_confirmation(fact)),
                };
                outcome.memory_count = 1;
                outcome
            }
            Err(e) => self.memory_apology(utterance, history, e).await,
        }
    }

    async fn recall(
        &self,
        owner: &str,
        utterance: &str,
        history: Vec<Turn>,
        query: &str,
    ) -> Outcome {
        let facts = match self.query_memory(owner, query).await {
            Ok(facts) => facts,
            Err(e) => return self.memory_apology(utterance, history, e).await,
        };

        let prompt =
            response::chat_prompt(utterance, history, vec![response::facts_block(&facts)]);
        let mut outcome = match self.complete(&prompt).await {
            Some(text) => Outcome {
                text,
                completion_used: true,
                ..Outcome::default()
            },
            None => Outcome::text(response::facts_listing(&facts)),
        };
        outcome.memory_count = facts.len();
        outcome
    }

    async fn forget(&self, owner: &str, target: ForgetTarget) -> Outcome {
        match target {
            ForgetTarget::All => match self.delete_memory(owner, DeleteTarget::All).await {
                Ok(removed) => Outcome {
                    memory_count: removed,
                    ..Outcome::text(response::forgot_all(removed))
                },
                Err(e) => self.forget_failure(owner, e),
            },
            ForgetTarget::Matching(text) => {
                let best = match with_retry(
                    &self.policy,
                    "memory query",
                    MentorError::StorageUnavailable,
                    || self.memory.query(owner, &text, 1),
                )
                .await
                {
                    Ok(facts) => facts.into_iter().next(),
                    Err(e) => return self.forget_failure(owner, e),
                };

                let Some(fact) = best else {
                    return Outcome::text(response::nothing_to_forget(&text));
                };
                match self.delete_memory(owner, DeleteTarget::Fact(fact.id)).await {
                    Ok(0) => Outcome::text(response::nothing_to_forget(&text)),
                    Ok(removed) => Outcome {
                        memory_count: removed,
                        ..Outcome::text(response::forgot_one(&fact))
                    },
                    Err(e) => self.forget_failure(owner, e),
                }
            }
        }
    }

    async fn calendar_query(
        &self,
        utterance: &str,
        history: Vec<Turn>,
        timeframe: &Timeframe,
    ) -> Outcome {
        let now = (self.clock)();
        let range = match timeframe::resolve(timeframe, now, self.tz) {
            Ok(range) => range,
            Err(e) => return Outcome::text(response::invalid_timeframe(&reason(&e))),
        };
        let period = timeframe::describe(timeframe, &range, self.tz);

        let events = match self.list_events(range).await {
            Ok(events) => events,
            Err(e) => {
                let message = match e {
                    MentorError::AuthRequired(_) => CALENDAR_AUTH_PROMPT,
                    MentorError::InvalidInput(_) => CALENDAR_REJECTED,
                    _ => CALENDAR_UNAVAILABLE,
                };
                return Outcome {
                    notes: vec![message.to_string()],
                    ..Outcome::text(message)
                };
            }
        };

        let mut outcome = if self.config.phrase_calendar {
            let prompt = response::chat_prompt(
                utterance,
                history,
                vec![response::events_block(&events, self.tz, &period)],
            );
            match self.complete(&prompt).await {
                Some(text) => Outcome {
                    text,
                    completion_used: true,
                    ..Outcome::default()
                },
                None => Outcome::text(response::events_listing(&events, self.tz, &period)),
            }
        } else {
            Outcome::text(response::events_listing(&events, self.tz, &period))
        };
        outcome.event_count = events.len();
        outcome
    }

    async fn compound(
        &self,
        owner: &str,
        utterance: &str,
        history: Vec<Turn>,
        query: &str,
        timeframe: &Timeframe,
        fact: Option<&str>,
    ) -> Outcome {
        let mut notes = Vec::new();

        // Memory first, then the calendar, one after the other.
        let mut saved = None;
        let mut memory_up = true;
        if let Some(fact) = fact {
            match self.add_fact(owner, fact).await {
                Ok(()) => saved = Some(fact),
                Err(e) => {
                    warn!(session = %owner, error = %e, "Memory unavailable, fact not stored");
                    notes.push(response::NOT_SAVED_NOTE.to_string());
                    memory_up = false;
                }
            }
        }

        let facts = if memory_up {
            match self.query_memory(owner, query).await {
                Ok(facts) => Some(facts),
                Err(e) => {
                    warn!(session = %owner, error = %e, "Memory unavailable for compound query");
                    notes.push(response::MEMORY_UNAVAILABLE_NOTE.to_string());
                    None
                }
            }
        } else {
            None
        };

        let now = (self.clock)();
        let events = match timeframe::resolve(timeframe, now, self.tz) {
            Ok(range) => {
                let period = timeframe::describe(timeframe, &range, self.tz);
                match self.list_events(range).await {
                    Ok(events) => Some((events, period)),
                    Err(e) => {
                        warn!(session = %owner, error = %e, "Calendar unavailable for compound query");
                        notes.push(match e {
                            MentorError::AuthRequired(_) => CALENDAR_AUTH_PROMPT.to_string(),
                            _ => response::CALENDAR_UNAVAILABLE_NOTE.to_string(),
                        });
                        None
                    }
                }
            }
            Err(e) => {
                notes.push(response::invalid_timeframe(&reason(&e)));
                None
            }
        };

        let mut grounding: Vec<GroundingBlock> = Vec::new();
        if let Some(fact) = saved {
            grounding.push(response::saved_fact_block(fact));
        }
        if let Some(facts) = &facts {
            grounding.push(response::facts_block(facts));
        }
        if let Some((events, period)) = &events {
            grounding.push(response::events_block(events, self.tz, period));
        }

        let prompt = response::chat_prompt(utterance, history, grounding);
        let (body, completion_used) = match self.complete(&prompt).await {
            Some(text) => (text, true),
            None => (
                self.compound_listing(saved, facts.as_deref(), events.as_ref()),
                false,
            ),
        };

        Outcome {
            text: response::with_notes(body, &notes),
            memory_count: facts
                .as_ref()
                .map_or(0, Vec::len)
                .max(usize::from(saved.is_some())),
            event_count: events.as_ref().map_or(0, |(e, _)| e.len()),
            notes,
            completion_used,
        }
    }

    fn compound_listing(
        &self,
        saved: Option<&str>,
        facts: Option<&[MemoryFact]>,
        events: Option<&(Vec<CalendarEvent>, String)>,
    ) -> String {
        let mut parts = Vec::new();
        if let Some(fact) = saved {
            parts.push(response::remember_confirmation(fact));
        }
        if let Some(facts) = facts {
            parts.push(response::facts_listing(facts));
        }
        if let Some((events, period)) = events {
            parts.push(response::events_listing(events, self.tz, period));
        }
        parts.join("\n\n")
    }

    async fn general_chat(&self, prompt: PromptContext) -> Outcome {
        match self.complete(&prompt).await {
            Some(text) => Outcome {
                text,
                completion_used: true,
                ..Outcome::default()
            },
            None => Outcome::text(response::general_fallback()),
        }
    }

    // -- Degradation --

    async fn memory_apology(
        &self,
        utterance: &str,
        history: Vec<Turn>,
        error: MentorError,
    ) -> Outcome {
        warn!(error = %error, "Memory unavailable, falling back to chat");
        let chat = self
            .general_chat(response::chat_prompt(utterance, history, Vec::new()))
            .await;
        Outcome {
            text: format!("{}\n\n{}", response::MEMORY_UNAVAILABLE, chat.text),
            notes: vec![response::MEMORY_UNAVAILABLE.to_string()],
            completion_used: chat.completion_used,
            ..Outcome::default()
        }
    }

    fn forget_failure(&self, owner: &str, error: MentorError) -> Outcome {
        warn!(session = %owner, error = %error, "Forget request failed");
        Outcome {
            notes: vec![response::MEMORY_UNAVAILABLE.to_string()],
            ..Outcome::text(response::forget_failed())
        }
    }

    // -- Gateway calls --

    async fn add_fact(&self, owner: &str, fact: &str) -> Result<(), MentorError> {
        let metadata = json!({ "source": "chat" });
        let id = with_retry(
            &self.policy,
            "memory add",
            MentorError::StorageUnavailable,
            || self.memory.add(owner, fact, Some(metadata.clone())),
        )
        .await?;
        debug!(session = %owner, fact_id = %id, "Fact stored");
        Ok(())
    }

    async fn query_memory(&self, owner: &str, query: &str) -> Result<Vec<MemoryFact>, MentorError> {
        with_retry(
            &self.policy,
            "memory query",
            MentorError::StorageUnavailable,
            || self.memory.query(owner, query, self.config.top_k),
        )
        .await
    }

    async fn delete_memory(&self, owner: &str, target: DeleteTarget) -> Result<usize, MentorError> {
        with_retry(
            &self.policy,
            "memory delete",
            MentorError::StorageUnavailable,
            || self.memory.delete(owner, target),
        )
        .await
    }

    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>, MentorError> {
        with_retry(
            &self.policy,
            "calendar list",
            MentorError::ProviderUnavailable,
            || self.calendar.list_events(range),
        )
        .await
    }

    /// Completion with one retry. `None` means use a template.
    async fn complete(&self, prompt: &PromptContext) -> Option<String> {
        if self.completion.is_offline() {
            return None;
        }
        let result = with_retry(
            &self.policy,
            "completion",
            MentorError::CompletionFailed,
            || self.completion.complete(prompt),
        )
        .await;
        match result {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(backend = %self.completion.name(), error = %e, "Completion failed, using template");
                None
            }
        }
    }
}

fn trace_state(session_id: &str, state: TurnState) {
    debug!(session = %session_id, state = ?state, "Turn state");
}

fn reason(error: &MentorError) -> String {
    match error {
        MentorError::InvalidInput(reason) => reason.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
