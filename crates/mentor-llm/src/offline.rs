//! Completion gateway used when no model is configured.

use async_trait::async_trait;

use mentor_core::error::{MentorError, Result};

use crate::gateway::{CompletionGateway, PromptContext};

/// Always fails, so callers fall back to their deterministic templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCompletion;

#[async_trait]
impl CompletionGateway for OfflineCompletion {
    fn name(&self) -> &str {
        "offline"
    }

    fn is_offline(&self) -> bool {
        true
    }

    async fn complete(&self, _context: &PromptContext) -> Result<String> {
        Err(MentorError::CompletionFailed(
            "no completion model configured".to_string(),
        ))
    }
}
