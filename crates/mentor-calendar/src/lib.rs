//! Mentor Calendar crate - read-only calendar access.
//!
//! Defines the `CalendarGateway` contract, the Google Calendar client, and
//! the OAuth `TokenStore` that holds the process-wide credential.

pub mod credentials;
pub mod gateway;
pub mod google;

pub use credentials::{ClientCredentials, StoredToken, TokenStore, CALENDAR_SCOPE};
pub use gateway::{normalize_events, CalendarGateway};
pub use google::GoogleCalendar;
