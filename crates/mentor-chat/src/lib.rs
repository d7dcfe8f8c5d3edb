//! Conversational core for Mentor.
//!
//! Routes each student utterance to the memory, calendar, or completion
//! gateway, composes the reply, and owns per-session turn history.

pub mod classifier;
pub mod error;
pub mod orchestrator;
pub mod response;
pub mod retry;
pub mod session;
pub mod timeframe;
pub mod types;

#[cfg(test)]
mod test_support;

pub use classifier::{IntentClassifier, Signals, Verdict};
pub use error::ChatError;
pub use orchestrator::ChatOrchestrator;
pub use retry::RetryPolicy;
pub use session::{Session, SessionRegistry};
pub use types::{
    ChatReply, Classification, ClassificationSource, ForgetTarget, ReplyMetadata, Request,
    SessionSummary, Timeframe, TurnState,
};
