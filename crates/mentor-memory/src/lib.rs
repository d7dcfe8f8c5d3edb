//! Mentor Memory crate - per-user fact storage.
//!
//! Provides the `MemoryGateway` contract and a WAL-mode SQLite
//! implementation with an FTS5 relevance index.

pub mod db;
pub mod gateway;
pub mod migrations;
pub mod store;

pub use db::Database;
pub use gateway::MemoryGateway;
pub use store::{build_fts_query, SqliteMemoryStore};
