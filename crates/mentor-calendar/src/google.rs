//! Google Calendar v3 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};

use mentor_core::config::CalendarConfig;
use mentor_core::error::{MentorError, Result};
use mentor_core::time::local_midnight;
use mentor_core::types::{CalendarEvent, TimeRange};

use crate::credentials::TokenStore;
use crate::gateway::{normalize_events, CalendarGateway};

/// Upper bound on result pages fetched for one range.
const MAX_PAGES: usize = 10;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventList {
    #[serde(default)]
    items: Vec<EventItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct EventItem {
    id: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<String>,
    date: Option<String>,
}

pub struct GoogleCalendar {
    api_base: String,
    calendar_id: String,
    max_results: u32,
    tz: Tz,
    tokens: Arc<TokenStore>,
    client: reqwest::Client,
}

impl GoogleCalendar {
    /// `tz` is the user's zone, used to anchor all-day events.
    pub fn new(config: &CalendarConfig, tz: Tz, tokens: Arc<TokenStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MentorError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            max_results: config.max_results,
            tz,
            tokens,
            client,
        })
    }

    fn events_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| MentorError::Config(format!("Invalid calendar api_base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MentorError::Config("calendar api_base cannot be a base".to_string()))?
            .push("calendars")
            .push(&self.calendar_id)
            .push("events");
        Ok(url)
    }

    /// One page of events. A rejected access token is refreshed and the
    /// request repeated once; `AuthRequired` only escapes when no new token
    /// can be obtained or the fresh one is rejected too.
    async fn fetch_page(&self, range: TimeRange, page_token: Option<&str>) -> Result<EventList> {
        let token = self.tokens.access_token().await?;
        match self.request_page(&token, range, page_token).await {
            Err(MentorError::AuthRequired(reason)) => {
                debug!(reason = %reason, "Calendar rejected access token, refreshing");
                let token = self.tokens.access_token().await?;
                self.request_page(&token, range, page_token).await
            }
            other => other,
        }
    }

    async fn request_page(
        &self,
        token: &str,
        range: TimeRange,
        page_token: Option<&str>,
    ) -> Result<EventList> {
        let mut params = vec![
            ("timeMin", range.start.to_rfc3339()),
            ("timeMax", range.end.to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", self.max_results.to_string()),
        ];
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(self.events_url()?)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| MentorError::ProviderUnavailable(format!("calendar request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => {
                    self.tokens.invalidate().await;
                    MentorError::AuthRequired(format!("calendar rejected credentials ({})", status))
                }
                429 => MentorError::ProviderUnavailable("calendar rate limit exceeded".to_string()),
                s if s >= 500 => {
                    MentorError::ProviderUnavailable(format!("calendar returned {}", status))
                }
                _ => MentorError::InvalidInput(format!("calendar request rejected ({}): {}", status, body)),
            });
        }

        response.json().await.map_err(|e| {
            MentorError::ProviderUnavailable(format!("malformed calendar response: {}", e))
        })
    }

    fn parse_item(&self, item: EventItem) -> Option<CalendarEvent> {
        let (start, all_day) = item.start.as_ref().and_then(|t| self.parse_time(t))?;
        let end = item
            .end
            .as_ref()
            .and_then(|t| self.parse_time(t))
            .map(|(end, _)| end)
            .unwrap_or(start);

        Some(CalendarEvent {
            id: item.id,
            title: item
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "(No title)".to_string()),
            start,
            end,
            all_day,
            location: item.location.filter(|s| !s.trim().is_empty()),
            description: item.description.filter(|s| !s.trim().is_empty()),
        })
    }

    fn parse_time(&self, time: &EventTime) -> Option<(DateTime<Utc>, bool)> {
        if let Some(raw) = &time.date_time {
            return DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| (dt.with_timezone(&Utc), false));
        }
        let raw = time.date.as_ref()?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(|date| (local_midnight(date, self.tz), true))
    }
}

#[async_trait]
impl CalendarGateway for GoogleCalendar {
    async fn list_events(&self, range: TimeRange) -> Result<Vec<CalendarEvent>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let list = self.fetch_page(range, page_token.as_deref()).await?;
            items.extend(list.items);
            page_token = list.next_page_token.filter(|t| !t.is_empty());
            if page_token.is_none() {
                break;
            }
            if page == MAX_PAGES {
                warn!(pages = MAX_PAGES, "Calendar results truncated at page limit");
            }
        }

        let total = items.len();
        let events: Vec<CalendarEvent> = items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.clone();
                let parsed = self.parse_item(item);
                if parsed.is_none() {
                    warn!(event_id = ?id, "Skipping calendar event without a usable start");
                }
                parsed
            })
            .collect();

        let events = normalize_events(events, range);
        debug!(fetched = total, kept = events.len(), "Calendar events listed");
        Ok(events)
    }
}
