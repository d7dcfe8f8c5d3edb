//! Database schema migrations.
//!
//! Creates the memory_facts table, its FTS5 index with sync triggers, and
//! the schema_migrations bookkeeping table.

use rusqlite::Connection;
use tracing::info;

use mentor_core::error::MentorError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MentorError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| {
        MentorError::StorageUnavailable(format!("Failed to create migrations table: {}", e))
    })?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            MentorError::StorageUnavailable(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: memory_facts");
    }

    Ok(())
}

/// Version 1: facts table plus full-text index.
fn apply_v1(conn: &Connection) -> Result<(), MentorError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS memory_facts (
            id          TEXT PRIMARY KEY NOT NULL,
            owner_id    TEXT NOT NULL,
            text        TEXT NOT NULL,
            metadata    TEXT,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memory_facts_owner
            ON memory_facts (owner_id, created_at DESC);

        CREATE VIRTUAL TABLE IF NOT EXISTS memory_facts_fts USING fts5(
            text,
            content = 'memory_facts',
            content_rowid = 'rowid',
            tokenize = 'porter unicode61'
        );

        CREATE TRIGGER IF NOT EXISTS memory_facts_ai AFTER INSERT ON memory_facts BEGIN
            INSERT INTO memory_facts_fts (rowid, text) VALUES (new.rowid, new.text);
        END;

        CREATE TRIGGER IF NOT EXISTS memory_facts_ad AFTER DELETE ON memory_facts BEGIN
            INSERT INTO memory_facts_fts (memory_facts_fts, rowid, text)
                VALUES ('delete', old.rowid, old.text);
        END;

        CREATE TRIGGER IF NOT EXISTS memory_facts_au AFTER UPDATE OF text ON memory_facts BEGIN
            INSERT INTO memory_facts_fts (memory_facts_fts, rowid, text)
                VALUES ('delete', old.rowid, old.text);
            INSERT INTO memory_facts_fts (rowid, text) VALUES (new.rowid, new.text);
        END;

        INSERT INTO schema_migrations (version, name) VALUES (1, 'memory_facts');
        ",
    )
    .map_err(|e| MentorError::StorageUnavailable(format!("Migration v1 failed: {}", e)))
}
