use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;

use crate::app_dirs::AppDirs;
use crate::round::{Outcome, Resolution};

/// Stats key for rounds played without a signed-in player
pub const ANONYMOUS: &str = "anonymous";

/// One resolved round as stored in the history table
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    pub player: String,
    pub word: String,
    pub input: String,
    pub outcome: Outcome,
    pub streak: u32,
    pub answer_ms: Option<u64>,
    pub played_at: DateTime<Local>,
}

impl RoundRecord {
    pub fn from_resolution(resolution: &Resolution) -> Self {
        Self {
            player: resolution
                .player
                .as_ref()
                .map_or(ANONYMOUS.to_string(), |p| p.as_str().to_string()),
            word: resolution.word.clone(),
            input: resolution.input.clone(),
            outcome: resolution.outcome,
            streak: resolution.streak,
            answer_ms: resolution.answered_after.map(|d| d.as_millis() as u64),
            played_at: Local::now(),
        }
    }
}

/// Aggregates shown on the stats screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSummary {
    pub rounds: u64,
    pub correct: u64,
    pub timed_out: u64,
    pub best_streak: u32,
    pub avg_answer_ms: Option<f64>,
    pub last_played: Option<DateTime<Local>>,
}

impl PlayerSummary {
    /// Percentage of rounds answered correctly
    pub fn accuracy(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.correct as f64 * 100.0 / self.rounds as f64
        }
    }
}

fn outcome_key(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Correct => "correct",
        Outcome::Incorrect => "incorrect",
        Outcome::TimedOut => "timed_out",
    }
}

/// Local per-round history
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database under the state directory, creating it if needed
    pub fn new() -> Result<Self> {
        Self::open(AppDirs::db_path())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS round_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id TEXT NOT NULL,
                word TEXT NOT NULL,
                input TEXT NOT NULL,
                outcome TEXT NOT NULL,
                streak INTEGER NOT NULL,
                answer_ms INTEGER,
                played_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_round_log_player ON round_log(player_id)",
            [],
        )?;

        Ok(StatsDb { conn })
    }

    pub fn record_round(&self, record: &RoundRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO round_log
            (player_id, word, input, outcome, streak, answer_ms, played_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.player,
                record.word,
                record.input,
                outcome_key(record.outcome),
                record.streak,
                record.answer_ms,
                record.played_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn summary(&self, player: &str) -> Result<PlayerSummary> {
        let (rounds, correct, timed_out, best_streak, avg_answer_ms): (
            i64,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<f64>,
        ) = self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                SUM(CASE WHEN outcome = 'correct' THEN 1 ELSE 0 END),
                SUM(CASE WHEN outcome = 'timed_out' THEN 1 ELSE 0 END),
                MAX(streak),
                AVG(CASE WHEN outcome = 'correct' THEN answer_ms END)
            FROM round_log
            WHERE player_id = ?1
            "#,
            [player],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )?;

        let last_played: Option<String> = self
            .conn
            .query_row(
                "SELECT played_at FROM round_log WHERE player_id = ?1 ORDER BY id DESC LIMIT 1",
                [player],
                |row| row.get(0),
            )
            .optional()?;

        Ok(PlayerSummary {
            rounds: rounds as u64,
            correct: correct.unwrap_or(0) as u64,
            timed_out: timed_out.unwrap_or(0) as u64,
            best_streak: best_streak.unwrap_or(0) as u32,
            avg_answer_ms,
            last_played: last_played
                .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
                .map(|ts| ts.with_timezone(&Local)),
        })
    }

    /// Words the player got wrong or ran out of time on, most misses first
    pub fn most_missed(&self, player: &str, limit: usize) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT word, COUNT(*) AS misses
            FROM round_log
            WHERE player_id = ?1 AND outcome != 'correct'
            GROUP BY word
            ORDER BY misses DESC, word ASC
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![player, limit as i64], |row| {
            let misses: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, misses as u64))
        })?;

        let mut missed = Vec::new();
        for row in rows {
            missed.push(row?);
        }
        Ok(missed)
    }

    pub fn clear_player(&self, player: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM round_log WHERE player_id = ?1", [player])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(player: &str, word: &str, outcome: Outcome, streak: u32) -> RoundRecord {
        RoundRecord {
            player: player.to_string(),
            word: word.to_string(),
            input: String::new(),
            outcome,
            streak,
            answer_ms: Some(1200),
            played_at: Local::now(),
        }
    }

    #[test]
    fn empty_history_summarizes_to_zero() {
        let db = StatsDb::in_memory().unwrap();
        let summary = db.summary("p1").unwrap();
        assert_eq!(summary, PlayerSummary::default());
        assert_eq!(summary.accuracy(), 0.0);
    }

    #[test]
    fn summary_counts_per_player() {
        let db = StatsDb::in_memory().unwrap();
        db.record_round(&record("p1", "galaxy", Outcome::Correct, 1)).unwrap();
        db.record_round(&record("p1", "pirate", Outcome::Correct, 2)).unwrap();
        db.record_round(&record("p1", "rhythm", Outcome::TimedOut, 0)).unwrap();
        db.record_round(&record("p1", "galaxy", Outcome::Incorrect, 0)).unwrap();
        db.record_round(&record("p2", "galaxy", Outcome::Correct, 7)).unwrap();

        let summary = db.summary("p1").unwrap();
        assert_eq!(summary.rounds, 4);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.best_streak, 2);
        assert_eq!(summary.accuracy(), 50.0);
        assert_eq!(summary.avg_answer_ms, Some(1200.0));
        assert!(summary.last_played.is_some());
    }

    #[test]
    fn most_missed_orders_by_misses() {
        let db = StatsDb::in_memory().unwrap();
        for outcome in [Outcome::Incorrect, Outcome::TimedOut, Outcome::Correct] {
            db.record_round(&record("p1", "rhythm", outcome, 0)).unwrap();
        }
        db.record_round(&record("p1", "galaxy", Outcome::Incorrect, 0)).unwrap();

        let missed = db.most_missed("p1", 5).unwrap();
        assert_eq!(
            missed,
            vec![("rhythm".to_string(), 2), ("galaxy".to_string(), 1)]
        );
        assert_eq!(db.most_missed("p1", 1).unwrap().len(), 1);
    }

    #[test]
    fn clear_player_leaves_others() {
        let db = StatsDb::in_memory().unwrap();
        db.record_round(&record("p1", "galaxy", Outcome::Correct, 1)).unwrap();
        db.record_round(&record("p2", "galaxy", Outcome::Correct, 1)).unwrap();

        db.clear_player("p1").unwrap();
        assert_eq!(db.summary("p1").unwrap().rounds, 0);
        assert_eq!(db.summary("p2").unwrap().rounds, 1);
    }

    #[test]
    fn history_persists_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("stats.db");
        StatsDb::open(&path)
            .unwrap()
            .record_round(&record(ANONYMOUS, "galaxy", Outcome::Correct, 1))
            .unwrap();

        assert_eq!(StatsDb::open(&path).unwrap().summary(ANONYMOUS).unwrap().rounds, 1);
    }
}
