//! Error types for the conversational interface.
//!
//! Only caller-contract violations are errors here. Gateway failures never
//! escape a turn; they are folded into the reply.

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("session id cannot be empty")]
    EmptySessionId,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
}
