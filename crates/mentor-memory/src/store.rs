//! SQLite-backed memory store.
//!
//! Facts live in `memory_facts`; relevance queries go through the FTS5
//! index and are ranked by BM25. All SQLite work runs on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use mentor_core::error::{MentorError, Result};
use mentor_core::types::{DeleteTarget, MemoryFact};

use crate::db::Database;
use crate::gateway::{validate_owner, MemoryGateway};

// Words that carry no retrieval signal in a question about the user.
static QUERY_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "am", "be", "been", "have", "has", "had",
    "do", "does", "did", "will", "would", "should", "can", "could", "i", "me", "my", "mine",
    "we", "our", "you", "your", "it", "its", "they", "them", "their", "what", "which", "who",
    "this", "that", "these", "those", "of", "in", "to", "for", "with", "on", "at", "from", "by",
    "about", "as", "and", "but", "or", "not", "no", "so", "if", "then", "any", "some", "how",
    "when", "where", "why", "know", "remember", "tell", "said", "say", "told", "anything",
    "everything", "something", "please", "recall",
];

const FACT_COLUMNS: &str = "f.id, f.owner_id, f.text, f.metadata, f.created_at, f.updated_at";

/// Memory gateway over a local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteMemoryStore {
    db: Arc<Database>,
}

impl SqliteMemoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store backed by a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    fn add_blocking(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Uuid> {
        validate_owner(owner_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(MentorError::InvalidInput(
                "fact text must not be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().timestamp_millis();
        let metadata = metadata.map(|m| m.to_string());

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memory_facts (id, owner_id, text, metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id.to_string(), owner_id, text, metadata, now],
            )
            .map_err(|e| MentorError::StorageUnavailable(format!("Failed to save fact: {}", e)))?;
            Ok(())
        })?;

        debug!(owner = %owner_id, id = %id, "Memory fact stored");
        Ok(id)
    }

    fn query_blocking(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryFact>> {
        validate_owner(owner_id)?;
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let Some(fts_query) = build_fts_query(query) else {
            // Only filler words ("what do you know about me"): answer with
            // the most recent facts instead of nothing.
            let mut facts = self.list_blocking(owner_id)?;
            facts.truncate(top_k);
            return Ok(facts);
        };

        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {FACT_COLUMNS}
                 FROM memory_facts_fts
                 JOIN memory_facts f ON f.rowid = memory_facts_fts.rowid
                 WHERE memory_facts_fts MATCH ?1 AND f.owner_id = ?2
                 ORDER BY rank
                 LIMIT ?3"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| MentorError::StorageUnavailable(format!("FTS5 prepare failed: {}", e)))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![fts_query, owner_id, top_k as i64],
                    |row| Ok(row_to_fact(row)),
                )
                .map_err(|e| MentorError::StorageUnavailable(format!("FTS5 query failed: {}", e)))?;

            let mut facts = Vec::new();
            for row in rows {
                facts.push(row.map_err(|e| MentorError::StorageUnavailable(e.to_string()))??);
            }
            Ok(facts)
        })
    }

    fn update_blocking(&self, owner_id: &str, id: Uuid, text: &str) -> Result<()> {
        validate_owner(owner_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(MentorError::InvalidInput(
                "fact text must not be empty".to_string(),
            ));
        }

        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE memory_facts SET text = ?1, updated_at = ?2 WHERE id = ?3 AND owner_id = ?4",
                rusqlite::params![text, Utc::now().timestamp_millis(), id.to_string(), owner_id],
            )
            .map_err(|e| MentorError::StorageUnavailable(format!("Failed to update fact: {}", e)))
        })?;

        if changed == 0 {
            return Err(MentorError::NotFound(format!("memory fact {}", id)));
        }
        Ok(())
    }

    fn delete_blocking(&self, owner_id: &str, target: DeleteTarget) -> Result<usize> {
        validate_owner(owner_id)?;
        let removed = self.db.with_conn(|conn| {
            let result = match &target {
                DeleteTarget::Fact(id) => conn.execute(
                    "DELETE FROM memory_facts WHERE id = ?1 AND owner_id = ?2",
                    rusqlite::params![id.to_string(), owner_id],
                ),
                DeleteTarget::All => conn.execute(
                    "DELETE FROM memory_facts WHERE owner_id = ?1",
                    rusqlite::params![owner_id],
                ),
            };
            result.map_err(|e| {
                MentorError::StorageUnavailable(format!("Failed to delete facts: {}", e))
            })
        })?;

        debug!(owner = %owner_id, removed, "Memory facts deleted");
        Ok(removed)
    }

    fn list_blocking(&self, owner_id: &str) -> Result<Vec<MemoryFact>> {
        validate_owner(owner_id)?;
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {FACT_COLUMNS} FROM memory_facts f
                 WHERE f.owner_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| MentorError::StorageUnavailable(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![owner_id], |row| Ok(row_to_fact(row)))
                .map_err(|e| MentorError::StorageUnavailable(e.to_string()))?;

            let mut facts = Vec::new();
            for row in rows {
                facts.push(row.map_err(|e| MentorError::StorageUnavailable(e.to_string()))??);
            }
            Ok(facts)
        })
    }

    /// Look up a single fact by id.
    pub fn find_by_id(&self, owner_id: &str, id: Uuid) -> Result<Option<MemoryFact>> {
        validate_owner(owner_id)?;
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {FACT_COLUMNS} FROM memory_facts f WHERE f.id = ?1 AND f.owner_id = ?2"
            );
            let result = conn
                .query_row(&sql, rusqlite::params![id.to_string(), owner_id], |row| {
                    Ok(row_to_fact(row))
                })
                .optional()
                .map_err(|e| MentorError::StorageUnavailable(e.to_string()))?;
            result.transpose()
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteMemoryStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store))
            .await
            .map_err(|e| MentorError::StorageUnavailable(format!("memory task failed: {}", e)))?
    }
}

#[async_trait]
impl MemoryGateway for SqliteMemoryStore {
    async fn add(
        &self,
        owner_id: &str,
        text: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Uuid> {
        let (owner_id, text) = (owner_id.to_string(), text.to_string());
        self.blocking(move |store| store.add_blocking(&owner_id, &text, metadata))
            .await
    }

    async fn query(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<MemoryFact>> {
        let (owner_id, query) = (owner_id.to_string(), query.to_string());
        self.blocking(move |store| store.query_blocking(&owner_id, &query, top_k))
            .await
    }

    async fn update(&self, owner_id: &str, id: Uuid, text: &str) -> Result<()> {
        let (owner_id, text) = (owner_id.to_string(), text.to_string());
        self.blocking(move |store| store.update_blocking(&owner_id, id, &text))
            .await
    }

    async fn delete(&self, owner_id: &str, target: DeleteTarget) -> Result<usize> {
        let owner_id = owner_id.to_string();
        self.blocking(move |store| store.delete_blocking(&owner_id, target))
            .await
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<MemoryFact>> {
        let owner_id = owner_id.to_string();
        self.blocking(move |store| store.list_blocking(&owner_id)).await
    }
}

/// Turn free text into an FTS5 expression of OR-ed quoted terms.
///
/// Returns `None` when nothing but stop words remain.
pub fn build_fts_query(text: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric() && c != '\'') {
        let clean = word.trim_matches('\'').to_lowercase();
        if clean.chars().count() < 2 || QUERY_STOP_WORDS.contains(&clean.as_str()) {
            continue;
        }
        // Drop possessive/contraction tails ("student's" -> "student").
        let clean = clean.split('\'').next().unwrap_or_default().to_string();
        if clean.chars().count() < 2 || terms.contains(&clean) {
            continue;
        }
        terms.push(clean);
    }

    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

fn row_to_fact(row: &Row<'_>) -> Result<MemoryFact> {
    let get_err = |e: rusqlite::Error| MentorError::StorageUnavailable(e.to_string());

    let id_str: String = row.get(0).map_err(get_err)?;
    let owner_id: String = row.get(1).map_err(get_err)?;
    let text: String = row.get(2).map_err(get_err)?;
    let metadata: Option<String> = row.get(3).map_err(get_err)?;
    let created_at: i64 = row.get(4).map_err(get_err)?;
    let updated_at: i64 = row.get(5).map_err(get_err)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| MentorError::StorageUnavailable(format!("Invalid UUID: {}", e)))?;
    let metadata = metadata
        .map(|m| serde_json::from_str::<serde_json::Value>(&m))
        .transpose()?;

    Ok(MemoryFact {
        id,
        owner_id,
        text,
        metadata,
        created_at: millis_to_utc(created_at),
        updated_at: millis_to_utc(updated_at),
    })
}

fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteMemoryStore {
        SqliteMemoryStore::in_memory().unwrap()
    }

    // ---- FTS query building ----

    #[test]
    fn test_build_fts_query_drops_stop_words() {
        assert_eq!(
            build_fts_query("What do you know about my study sessions?").unwrap(),
            "\"study\" OR \"sessions\""
        );
    }

    #[test]
    fn test_build_fts_query_only_stop_words() {
        assert!(build_fts_query("what do you know about me").is_none());
        assert!(build_fts_query("?!").is_none());
    }

    #[test]
    fn test_build_fts_query_dedupes_and_strips_possessive() {
        assert_eq!(
            build_fts_query("Calculus, calculus and the professor's hours").unwrap(),
            "\"calculus\" OR \"professor\" OR \"hours\""
        );
    }

    // ---- add / query ----

    #[tokio::test]
    async fn test_add_then_query_overlapping_terms() {
        let s = store();
        let id = s
            .add("u1", "prefers morning study sessions", None)
            .await
            .unwrap();
        let facts = s.query("u1", "when should I plan a morning session?", 5).await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].id, id);
        assert_eq!(facts[0].text, "prefers morning study sessions");
    }

    #[tokio::test]
    async fn test_query_ranks_more_relevant_first() {
        let s = store();
        s.add("u1", "is taking CS101 this semester", None).await.unwrap();
        let best = s
            .add("u1", "needs extra help with calculus homework in calculus class", None)
            .await
            .unwrap();
        s.add("u1", "likes calculus a little", None).await.unwrap();

        let facts = s.query("u1", "calculus help", 5).await.unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].id, best);
    }

    #[tokio::test]
    async fn test_query_respects_top_k() {
        let s = store();
        for i in 0..5 {
            s.add("u1", &format!("course number {} is physics", i), None)
                .await
                .unwrap();
        }
        assert_eq!(s.query("u1", "physics", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_query_empty_text_returns_empty() {
        let s = store();
        s.add("u1", "prefers tea", None).await.unwrap();
        assert!(s.query("u1", "", 5).await.unwrap().is_empty());
        assert!(s.query("u1", "   ", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_filler_words_returns_recent_facts() {
        let s = store();
        s.add("u1", "prefers tea", None).await.unwrap();
        s.add("u1", "is taking Math202", None).await.unwrap();
        let facts = s.query("u1", "what do you know about me?", 5).await.unwrap();
        assert_eq!(facts.len(), 2);
    }

    #[tokio::test]
    async fn test_owners_are_isolated() {
        let s = store();
        s.add("alice", "prefers morning study sessions", None)
            .await
            .unwrap();
        assert!(s.query("bob", "morning", 5).await.unwrap().is_empty());
        assert!(s.list("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_owner_rejected() {
        let s = store();
        let err = s.add("", "fact", None).await.unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
        let err = s.query(" ", "fact", 5).await.unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_fact_rejected() {
        let s = store();
        let err = s.add("u1", "  ", None).await.unwrap_err();
        assert!(matches!(err, MentorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_metadata_round_trips() {
        let s = store();
        let id = s
            .add("u1", "prefers tea", Some(serde_json::json!({"source": "chat"})))
            .await
            .unwrap();
        let fact = s.find_by_id("u1", id).unwrap().unwrap();
        assert_eq!(fact.metadata.unwrap()["source"], "chat");
    }

    // ---- update ----

    #[tokio::test]
    async fn test_update_reindexes_text() {
        let s = store();
        let id = s.add("u1", "prefers tea", None).await.unwrap();
        s.update("u1", id, "prefers coffee").await.unwrap();

        assert!(s.query("u1", "tea", 5).await.unwrap().is_empty());
        let facts = s.query("u1", "coffee", 5).await.unwrap();
        assert_eq!(facts[0].id, id);
        assert!(facts[0].updated_at >= facts[0].created_at);
    }

    #[tokio::test]
    async fn test_update_other_owner_not_found() {
        let s = store();
        let id = s.add("alice", "prefers tea", None).await.unwrap();
        let err = s.update("bob", id, "hijacked").await.unwrap_err();
        assert!(matches!(err, MentorError::NotFound(_)));
    }

    // ---- delete / list ----

    #[tokio::test]
    async fn test_delete_single_fact() {
        let s = store();
        let keep = s.add("u1", "prefers tea", None).await.unwrap();
        let drop = s.add("u1", "prefers coffee", None).await.unwrap();

        assert_eq!(s.delete("u1", DeleteTarget::Fact(drop)).await.unwrap(), 1);
        let facts = s.list("u1").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].id, keep);
        assert!(s.query("u1", "coffee", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_only_touches_owner() {
        let s = store();
        s.add("alice", "prefers tea", None).await.unwrap();
        s.add("alice", "prefers jazz", None).await.unwrap();
        s.add("bob", "prefers tea", None).await.unwrap();

        assert_eq!(s.delete("alice", DeleteTarget::All).await.unwrap(), 2);
        assert!(s.list("alice").await.unwrap().is_empty());
        assert_eq!(s.list("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_fact_removes_nothing() {
        let s = store();
        assert_eq!(
            s.delete("u1", DeleteTarget::Fact(Uuid::new_v4())).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let s = store();
        let first = s.add("u1", "first fact", None).await.unwrap();
        let second = s.add("u1", "second fact", None).await.unwrap();
        let facts = s.list("u1").await.unwrap();
        assert_eq!(facts[0].id, second);
        assert_eq!(facts[1].id, first);
    }
}
