use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;
use serde_json::{Number, Value};

use super::{rank, upsert, LeaderboardEntry, ScoreStore, StoreError};
use crate::identity::PlayerId;

/// Whole-file JSON snapshot of `[{playerId, score, username?}]`.
///
/// Every submission re-reads the file, merges, and rewrites it through a
/// temporary sibling that is renamed into place. Writers inside one process are
/// serialized; separate processes sharing the file can still overwrite each
/// other's update.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<Vec<LeaderboardEntry>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<Value> = serde_json::from_str(&contents)?;
        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            match entry_from_record(record) {
                Ok(entry) => entries.push(entry),
                Err(reason) => warn!(
                    "skipping record in {} ({}): {}",
                    self.path.display(),
                    reason,
                    record
                ),
            }
        }
        Ok(entries)
    }

    fn write_all(&self, entries: &[LeaderboardEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Snapshots may hold any JSON number for `score`; fractions are truncated and
/// negatives read as zero.
fn entry_from_record(record: &Value) -> Result<LeaderboardEntry, String> {
    let raw_id = record
        .get("playerId")
        .or_else(|| record.get("wallet"))
        .and_then(Value::as_str)
        .ok_or("missing playerId")?;
    let player_id = PlayerId::parse(raw_id).map_err(|e| e.to_string())?;

    let score = match record.get("score") {
        Some(Value::Number(n)) => coerce_score(n),
        _ => return Err("score is not a number".to_string()),
    };

    let username = record
        .get("username")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Ok(LeaderboardEntry::new(player_id, score).with_username(username))
}

fn coerce_score(n: &Number) -> u64 {
    if let Some(score) = n.as_u64() {
        return score;
    }
    match n.as_f64() {
        Some(score) if score.is_finite() && score > 0.0 => score.trunc() as u64,
        _ => 0,
    }
}

impl ScoreStore for JsonFileStore {
    fn submit(&self, entry: LeaderboardEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        // an unreadable snapshot is replaced rather than blocking every write
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StoreError::Json(e)) => {
                warn!("discarding malformed {}: {}", self.path.display(), e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        upsert(&mut entries, entry);
        self.write_all(&entries)
    }

    fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        Ok(rank(self.read_all()?, limit))
    }
}
