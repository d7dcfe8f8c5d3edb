//! Types flowing through a chat turn.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use mentor_core::types::Intent;

// =============================================================================
// Classification
// =============================================================================

/// A time slot as the user phrased it, before it is pinned to a clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timeframe {
    Today,
    Tomorrow,
    /// Today plus the six days after it.
    ThisWeek,
    /// Monday through Sunday of the following calendar week.
    NextWeek,
    /// Next occurrence of the weekday, today included.
    Weekday(Weekday),
    /// An explicit date. `year` is absent for "October 20" style dates.
    /// Components are unchecked until resolution.
    Date {
        year: Option<i32>,
        month: u32,
        day: u32,
    },
    /// Nothing said: the coming seven days.
    Upcoming,
}

/// What a forget request should remove.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForgetTarget {
    All,
    /// The single best match for this text.
    Matching(String),
}

/// A classified utterance together with its slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Remember { fact: String },
    Recall { query: String },
    Forget { target: ForgetTarget },
    Calendar { timeframe: Timeframe },
    /// Memory and calendar together. `fact`, when present, is stored
    /// before anything is looked up.
    Compound {
        query: String,
        timeframe: Timeframe,
        fact: Option<String>,
    },
    /// Plain conversation. `clarify` holds a fixed question to ask back
    /// instead of calling the model.
    Chat { clarify: Option<String> },
}

impl Request {
    pub fn intent(&self) -> Intent {
        match self {
            Request::Remember { .. } => Intent::MemoryAdd,
            Request::Recall { .. } => Intent::MemoryQuery,
            Request::Forget { .. } => Intent::MemoryDelete,
            Request::Calendar { .. } => Intent::CalendarQuery,
            Request::Compound { .. } => Intent::Compound,
            Request::Chat { .. } => Intent::GeneralChat,
        }
    }
}

/// How the intent was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Blank utterance.
    Empty,
    Keyword,
    Model,
    /// Model unavailable, disabled, or unintelligible.
    Default,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub request: Request,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn intent(&self) -> Intent {
        self.request.intent()
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Lifecycle of a single utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnState {
    Received,
    Classified,
    Dispatched,
    Composed,
    Delivered,
}

/// Structured detail about how a reply was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMetadata {
    pub intent: Intent,
    pub source: ClassificationSource,
    pub state: TurnState,
    /// Degradations the user was told about, in the order they happened.
    pub notes: Vec<String>,
    pub memory_count: usize,
    pub event_count: usize,
    /// Whether the model phrased the reply (as opposed to a template).
    pub completion_used: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub text: String,
    pub metadata: ReplyMetadata,
}

/// Listing entry for the session registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub turn_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
