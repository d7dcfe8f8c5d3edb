//! The memory gateway contract.

use async_trait::async_trait;
use uuid::Uuid;

use mentor_core::error::{MentorError, Result};
use mentor_core::types::{DeleteTarget, MemoryFact};

/// Uniform interface to a persistent, per-user store of free-text facts.
///
/// Every method rejects an empty `owner_id` with `InvalidInput`. A backing
/// store that cannot be reached surfaces as `StorageUnavailable`.
#[async_trait]
pub trait MemoryGateway: Send + Sync {
    /// Store a fact and return its id.
    async fn add(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Uuid>;

    /// Facts relevant to `query`, most relevant first, at most `top_k`.
    ///
    /// An empty query yields an empty result rather than an error.
    async fn query(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryFact>>;

    /// Replace the text of an existing fact.
    async fn update(&self, owner_id: &str, id: Uuid, text: &str) -> Result<()>;

    /// Remove one fact or all of them. Returns how many were removed.
    async fn delete(&self, owner_id: &str, target: DeleteTarget) -> Result<usize>;

    /// Every fact for the owner, newest first.
    async fn list(&self, owner_id: &str) -> Result<Vec<MemoryFact>>;
}

/// Reject blank owner ids before touching the store.
pub fn validate_owner(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(MentorError::InvalidInput(
            "owner_id must not be empty".to_string(),
        ));
    }
    Ok(())
}
