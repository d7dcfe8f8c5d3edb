//! The calendar gateway contract.

use async_trait::async_trait;

use mentor_core::error::Result;
use mentor_core::types::{CalendarEvent, TimeRange};

/// Read-only access to a user's calendar.
///
/// Missing or rejected credentials surface as `AuthRequired`; network and
/// provider trouble as `ProviderUnavailable`.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Events starting inside `range`, sorted by start ascending.
    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>>;
}

/// Keep events whose start lies in `range` and order them by start.
pub fn normalize_events(events: Vec<CalendarEvent>, range: TimeRange) -> Vec<CalendarEvent> {
    let mut kept: Vec<CalendarEvent> = events
        .into_iter()
        .filter(|e| range.contains(e.start))
        .collect();
    kept.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));
    kept
}
