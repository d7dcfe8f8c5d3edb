//! Mentor LLM crate - completion gateway.
//!
//! Defines the `CompletionGateway` contract, the `PromptContext` handed to
//! it, an OpenAI-compatible client, and an offline stand-in.

pub mod gateway;
pub mod offline;
pub mod openai;

use std::sync::Arc;

use tracing::{info, warn};

use mentor_core::config::LlmConfig;

pub use gateway::{ChatMessage, CompletionGateway, GroundingBlock, MessageRole, PromptContext};
pub use offline::OfflineCompletion;
pub use openai::OpenAiCompletion;

/// Pick the completion backend for this process.
///
/// Without an API key in the configured environment variable the
/// assistant runs on templates only.
pub fn build_completion(config: &LlmConfig) -> Arc<dyn CompletionGateway> {
    match config.api_key() {
        Some(key) => match OpenAiCompletion::new(config, key) {
            Ok(client) => {
                info!(model = %config.model, "Completion model enabled");
                Arc::new(client)
            }
            Err(e) => {
                warn!(error = %e, "Completion client unavailable, running offline");
                Arc::new(OfflineCompletion)
            }
        },
        None => {
            info!(
                env = %config.api_key_env,
                "No completion API key set, running in template mode"
            );
            Arc::new(OfflineCompletion)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_completion_without_key_is_offline() {
        let config = LlmConfig {
            api_key_env: "MENTOR_TEST_UNSET_COMPLETION_KEY".to_string(),
            ..LlmConfig::default()
        };
        let completion = build_completion(&config);
        assert_eq!(completion.name(), "offline");
        assert!(completion.is_offline());
    }
}
