//! Reply composition.
//!
//! Fixed templates for everything the assistant can say without a model,
//! plus the prompt contexts handed to the completion gateway when it can.

use chrono_tz::Tz;

use mentor_core::types::{CalendarEvent, MemoryFact, Turn};
use mentor_llm::{GroundingBlock, PromptContext};

// =============================================================================
// Prompts
// =============================================================================

pub const SYSTEM_PROMPT: &str = "You are a helpful academic assistant for students. \
You can see what you remember about the student and, when relevant, their calendar. \
Be friendly and concise, and use what you remember to personalize your answers. \
Only mention calendar events or facts that appear in the context you were given.";

const CLASSIFY_PROMPT: &str = "Classify the student's latest message into exactly one intent.
MEMORY_ADD: they share a fact or preference to be remembered.
MEMORY_QUERY: they ask what you know or remember about them.
MEMORY_DELETE: they ask you to forget something.
CALENDAR_QUERY: they ask about their schedule, events or free time.
COMPOUND: they ask something needing both their stored facts and their calendar.
GENERAL_CHAT: anything else.
Answer with the label only.";

// =============================================================================
// Clarifying questions
// =============================================================================

pub const CLARIFY_EMPTY: &str =
    "I didn't catch anything there. What would you like help with today?";
pub const CLARIFY_FACT: &str = "What would you like me to remember?";
pub const CLARIFY_FORGET: &str =
    "Which memory should I forget? You can also say \"forget everything\".";

// =============================================================================
// Degradation notes
// =============================================================================

pub const MEMORY_UNAVAILABLE: &str =
    "Sorry, I can't reach your saved memories right now.";
pub const CALENDAR_UNAVAILABLE_NOTE: &str =
    "Note: your calendar is unavailable right now, so events are not included.";
pub const MEMORY_UNAVAILABLE_NOTE: &str =
    "Note: your saved memories are unavailable right now, so they are not included.";
pub const NOT_SAVED_NOTE: &str =
    "Note: I couldn't save that to memory right now. Please tell me again later.";
pub const CALENDAR_AUTH_PROMPT: &str = "I need access to your Google Calendar first. \
Run `mentor calendar-auth` to connect it, then ask me again.";
pub const CALENDAR_UNAVAILABLE: &str =
    "I couldn't reach your calendar right now. Please try again in a moment.";
pub const CALENDAR_REJECTED: &str =
    "Your calendar provider rejected that request. Try asking about a different time.";

const GENERAL_FALLBACK: &str = "I can't chat freely right now, but I can still help. \
Tell me something to remember (\"Remember that I prefer morning study sessions\") \
or ask about your schedule (\"What's on my calendar today?\").";

// =============================================================================
// Templates
// =============================================================================

pub fn remember_confirmation(fact: &str) -> String {
    format!("Got it. I've saved this to memory: {}.", fact_for_sentence(fact))
}

pub fn forgot_all(count: usize) -> String {
    match count {
        0 => "There was nothing to forget. I don't have any memories about you yet.".to_string(),
        1 => "Done. I've forgotten the 1 thing I remembered about you.".to_string(),
        n => format!("Done. I've forgotten all {} things I remembered about you.", n),
    }
}

pub fn forgot_one(fact: &MemoryFact) -> String {
    format!("Done. I've forgotten this: {}.", fact_for_sentence(&fact.text))
}

pub fn nothing_to_forget(text: &str) -> String {
    format!("I couldn't find anything I remember about \"{}\".", text)
}

pub fn forget_failed() -> String {
    format!(
        "{} I couldn't forget anything, so please try again later.",
        MEMORY_UNAVAILABLE
    )
}

pub fn invalid_timeframe(reason: &str) -> String {
    format!(
        "I couldn't work out which dates you meant ({}). Try \"today\", \"next week\" or a date like 2026-10-20.",
        reason
    )
}

pub fn general_fallback() -> String {
    GENERAL_FALLBACK.to_string()
}

/// Bullet list of facts, or a friendly empty-state message.
pub fn facts_listing(facts: &[MemoryFact]) -> String {
    if facts.is_empty() {
        return "I don't have anything stored about that yet. Tell me about your courses, \
preferences or study habits and I'll remember them."
            .to_string();
    }
    let mut out = String::from("Here's what I remember about you:");
    for fact in facts {
        out.push_str("\n- ");
        out.push_str(&fact.text);
    }
    out
}

/// Numbered event list in start order, or an empty-state message.
pub fn events_listing(events: &[CalendarEvent], tz: Tz, period: &str) -> String {
    if events.is_empty() {
        return format!("You have no events {}.", period);
    }
    let noun = if events.len() == 1 { "event" } else { "events" };
    let mut out = format!("You have {} {} {}:", events.len(), noun, period);
    for (i, event) in events.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, format_event(event, tz)));
    }
    out
}

/// One line describing an event in the student's zone.
pub fn format_event(event: &CalendarEvent, tz: Tz) -> String {
    let start = event.start.with_timezone(&tz);
    let when = if event.all_day {
        format!("{}, all day", start.format("%a %b %-d"))
    } else {
        let end = event.end.with_timezone(&tz);
        format!(
            "{}, {} - {}",
            start.format("%a %b %-d"),
            start.format("%-I:%M %p"),
            end.format("%-I:%M %p")
        )
    };

    let mut line = format!("{}: {}", when, event.title);
    if let Some(location) = &event.location {
        line.push_str(&format!(" ({})", location));
    }
    line
}

/// Append user-visible degradation notes after the body.
pub fn with_notes(body: String, notes: &[String]) -> String {
    if notes.is_empty() {
        return body;
    }
    let mut out = body;
    for note in notes {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(note);
    }
    out
}

fn fact_for_sentence(fact: &str) -> String {
    fact.trim().trim_end_matches(['.', '!']).to_string()
}

// =============================================================================
// Prompt contexts
// =============================================================================

pub fn facts_block(facts: &[MemoryFact]) -> GroundingBlock {
    GroundingBlock::new(
        "What you remember about the student",
        facts.iter().map(|f| f.text.clone()).collect(),
    )
}

pub fn events_block(events: &[CalendarEvent], tz: Tz, period: &str) -> GroundingBlock {
    GroundingBlock::new(
        format!("The student's calendar {}", period),
        events.iter().map(|e| format_event(e, tz)).collect(),
    )
}

pub fn saved_fact_block(fact: &str) -> GroundingBlock {
    GroundingBlock::new("Newly saved fact", vec![fact.to_string()])
}

/// Context for asking the model to phrase a memory confirmation.
pub fn remember_prompt(fact: &str, utterance: &str, history: Vec<Turn>) -> PromptContext {
    PromptContext::new(
        format!(
            "{} You have just saved a new fact about the student. Confirm it briefly in one sentence.",
            SYSTEM_PROMPT
        ),
        utterance,
    )
    .with_grounding(saved_fact_block(fact))
    .with_history(history)
}

/// Context for the intent-label fallback.
pub fn classify_prompt(utterance: &str, history: Vec<Turn>) -> PromptContext {
    PromptContext::new(CLASSIFY_PROMPT, utterance).with_history(history)
}

/// Context for free conversation, optionally grounded.
pub fn chat_prompt(
    utterance: &str,
    history: Vec<Turn>,
    grounding: Vec<GroundingBlock>,
) -> PromptContext {
    let mut context = PromptContext::new(SYSTEM_PROMPT, utterance).with_history(history);
    for block in grounding {
        context = context.with_grounding(block);
    }
    context
}
