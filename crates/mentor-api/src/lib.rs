//! Mentor API crate - axum HTTP chat surface.
//!
//! Exposes the orchestrator's chat entry point, session history, and the
//! per-student memory listing behind bearer-token authentication.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
