use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MentorError, Result};

// =============================================================================
// Enums
// =============================================================================

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of purposes an utterance can be classified into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Store a new fact about the user.
    MemoryAdd,
    /// Answer from stored facts.
    MemoryQuery,
    /// Forget one fact or everything.
    MemoryDelete,
    /// List calendar events for a time range.
    CalendarQuery,
    /// Memory lookup and calendar lookup merged into one answer.
    Compound,
    /// Plain conversation with the model.
    GeneralChat,
}

impl Intent {
    /// Every intent, in the order presented to the model.
    pub const ALL: [Intent; 6] = [
        Intent::MemoryAdd,
        Intent::MemoryQuery,
        Intent::MemoryDelete,
        Intent::CalendarQuery,
        Intent::Compound,
        Intent::GeneralChat,
    ];

    /// The label used on the wire and in model prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::MemoryAdd => "MEMORY_ADD",
            Intent::MemoryQuery => "MEMORY_QUERY",
            Intent::MemoryDelete => "MEMORY_DELETE",
            Intent::CalendarQuery => "CALENDAR_QUERY",
            Intent::Compound => "COMPOUND",
            Intent::GeneralChat => "GENERAL_CHAT",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Intent {
    type Err = MentorError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_uppercase();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.label() == wanted)
            .ok_or_else(|| MentorError::InvalidInput(format!("unknown intent label: {}", s)))
    }
}

/// What a memory delete removes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteTarget {
    /// A single fact by id.
    Fact(Uuid),
    /// Every fact owned by the user.
    All,
}

// =============================================================================
// Structs
// =============================================================================

/// One entry in a session transcript. Never mutated after it is appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A free-text fact remembered about a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: Uuid,
    pub owner_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A read-only calendar entry as returned by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Date-only event (no wall-clock times).
    #[serde(default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Half-open interval `[start, end)` in UTC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Build a range, rejecting empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(MentorError::InvalidInput(format!(
                "time range end {} is not after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Whether `instant` falls inside `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, h, 0, 0).unwrap()
    }

    #[test]
    fn test_intent_labels_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(intent.label().parse::<Intent>().unwrap(), intent);
        }
    }

    #[test]
    fn test_intent_parse_is_case_insensitive() {
        assert_eq!(" compound ".parse::<Intent>().unwrap(), Intent::Compound);
        assert!("CALENDAR".parse::<Intent>().is_err());
    }

    #[test]
    fn test_intent_serde_uses_labels() {
        let json = serde_json::to_string(&Intent::CalendarQuery).unwrap();
        assert_eq!(json, "\"CALENDAR_QUERY\"");
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        assert!(TimeRange::new(at(10), at(9)).is_err());
        assert!(TimeRange::new(at(10), at(10)).is_err());
        assert!(TimeRange::new(at(9), at(10)).is_ok());
    }

    #[test]
    fn test_time_range_is_half_open() {
        let range = TimeRange::new(at(0), at(0) + Duration::days(1)).unwrap();
        assert!(range.contains(at(0)));
        assert!(range.contains(at(23)));
        assert!(!range.contains(at(0) + Duration::days(1)));
        assert!(!range.contains(at(0) - Duration::seconds(1)));
    }

    #[test]
    fn test_turn_constructors_set_role() {
        assert_eq!(Turn::user("hi").role, Role::User);
        assert_eq!(Turn::assistant("hello").role, Role::Assistant);
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }

    #[test]
    fn test_calendar_event_optional_fields_skipped() {
        let event = CalendarEvent {
            id: None,
            title: "Standup".to_string(),
            start: at(9),
            end: at(10),
            all_day: false,
            location: None,
            description: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("location").is_none());
        assert_eq!(json["title"], "Standup");
    }
}
