//! Score Store: persistence and retrieval of leaderboard entries.
//!
//! Every backend applies the same policy: one entry per player, and a new
//! submission overwrites the stored score (last write wins, never a maximum).

pub mod file;
pub mod http;
pub mod memory;
pub mod sqlite;

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::PlayerId;

pub use file::JsonFileStore;
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Number of entries shown and served
pub const LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("leaderboard file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("leaderboard data is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("leaderboard database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("leaderboard request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("leaderboard service answered {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("leaderboard store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    #[serde(alias = "wallet")]
    pub player_id: PlayerId,
    pub score: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl LeaderboardEntry {
    pub fn new(player_id: PlayerId, score: u64) -> Self {
        Self {
            player_id,
            score,
            username: None,
        }
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username;
        self
    }

    /// Username when known, otherwise the abbreviated player id
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) => name.clone(),
            None => self.player_id.abbreviated(),
        }
    }

    /// Validate an untyped POST body. Accepts `playerId` or the legacy
    /// `wallet` key; `score` must be a non-negative integer.
    pub fn from_payload(body: &Value) -> Result<Self, StoreError> {
        let raw_id = body
            .get("playerId")
            .or_else(|| body.get("wallet"))
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::InvalidPayload("playerId is required".into()))?;

        let player_id = PlayerId::parse(raw_id)
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;

        let score = body
            .get("score")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                StoreError::InvalidPayload("score must be a non-negative integer".into())
            })?;

        let username = match body.get("username") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
            Some(Value::String(_)) => None,
            Some(_) => {
                return Err(StoreError::InvalidPayload(
                    "username must be a string".into(),
                ))
            }
        };

        Ok(Self::new(player_id, score).with_username(username))
    }
}

/// Persistence backend for leaderboard entries
pub trait ScoreStore: Send + Sync {
    /// Insert or overwrite the entry for `entry.player_id`
    fn submit(&self, entry: LeaderboardEntry) -> Result<(), StoreError>;
    /// Highest scores first, at most `limit` entries
    fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

/// Descending by score; equal scores keep their insertion order
pub fn rank(entries: Vec<LeaderboardEntry>, limit: usize) -> Vec<LeaderboardEntry> {
    entries
        .into_iter()
        .sorted_by(|a, b| b.score.cmp(&a.score))
        .take(limit)
        .collect()
}

/// Last-write-wins merge of one submission into an in-memory snapshot
pub fn upsert(entries: &mut Vec<LeaderboardEntry>, entry: LeaderboardEntry) {
    match entries.iter_mut().find(|e| e.player_id == entry.player_id) {
        Some(existing) => {
            existing.score = entry.score;
            if entry.username.is_some() {
                existing.username = entry.username;
            }
        }
        None => entries.push(entry),
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    /// Process-local, lost on exit
    Memory,
    /// JSON snapshot file
    File,
    /// SQLite database
    Sqlite,
    /// Remote `wordmint serve` instance
    Http,
}

/// Build the configured backend
pub fn open_store(
    kind: StoreKind,
    path: Option<PathBuf>,
    server_url: &str,
) -> Result<Arc<dyn ScoreStore>, StoreError> {
    let store: Arc<dyn ScoreStore> = match kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::File => Arc::new(JsonFileStore::new(
            path.unwrap_or_else(crate::app_dirs::AppDirs::leaderboard_path),
        )),
        StoreKind::Sqlite => Arc::new(SqliteStore::open(
            path.unwrap_or_else(crate::app_dirs::AppDirs::leaderboard_db_path),
        )?),
        StoreKind::Http => Arc::new(HttpStore::new(server_url)?),
    };
    Ok(store)
}
