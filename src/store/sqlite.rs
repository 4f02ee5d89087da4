use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use rusqlite::{params, Connection};

use super::{LeaderboardEntry, ScoreStore, StoreError};
use crate::identity::PlayerId;

/// SQLite-backed leaderboard; the conflict clause keeps one row per player
/// and overwrites its score.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS leaderboard (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL UNIQUE,
                score INTEGER NOT NULL,
                username TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_leaderboard_score ON leaderboard(score)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ScoreStore for SqliteStore {
    fn submit(&self, entry: LeaderboardEntry) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            r#"
            INSERT INTO leaderboard (player_id, score, username, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(player_id) DO UPDATE SET
                score = excluded.score,
                username = COALESCE(excluded.username, leaderboard.username),
                updated_at = excluded.updated_at
            "#,
            params![
                entry.player_id.as_str(),
                entry.score,
                entry.username,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT player_id, score, username
            FROM leaderboard
            ORDER BY score DESC, id ASC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let raw_id: String = row.get(0)?;
            let player_id = PlayerId::parse(&raw_id).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

            Ok(LeaderboardEntry {
                player_id,
                score: row.get(1)?,
                username: row.get(2)?,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(id: &str, score: u64) -> LeaderboardEntry {
        LeaderboardEntry::new(PlayerId::parse(id).unwrap(), score)
    }

    #[test]
    fn upsert_keeps_single_row() {
        let store = SqliteStore::in_memory().unwrap();
        store.submit(entry("p1", 5)).unwrap();
        store.submit(entry("p1", 5)).unwrap();

        assert_eq!(store.top(10).unwrap(), vec![entry("p1", 5)]);
    }

    #[test]
    fn latest_score_wins() {
        let store = SqliteStore::in_memory().unwrap();
        store.submit(entry("p1", 8)).unwrap();
        store.submit(entry("p1", 1)).unwrap();

        assert_eq!(store.top(10).unwrap()[0].score, 1);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let store = SqliteStore::in_memory().unwrap();
        store.submit(entry("p1", 3)).unwrap();
        store.submit(entry("p2", 9)).unwrap();
        store.submit(entry("p3", 9)).unwrap();
        // updating p2 must not move it behind p3
        store.submit(entry("p2", 9)).unwrap();

        let ids: Vec<String> = store
            .top(10)
            .unwrap()
            .into_iter()
            .map(|e| e.player_id.to_string())
            .collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);
    }

    #[test]
    fn username_survives_score_only_update() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .submit(entry("p1", 1).with_username(Some("Ada".into())))
            .unwrap();
        store.submit(entry("p1", 2)).unwrap();

        let top = store.top(1).unwrap();
        assert_eq!(top[0].username.as_deref(), Some("Ada"));
        assert_eq!(top[0].score, 2);
    }

    #[test]
    fn file_backed_database_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("leaderboard.db");
        SqliteStore::open(&path).unwrap().submit(entry("p1", 4)).unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.top(10).unwrap(), vec![entry("p1", 4)]);
    }
}
