use std::sync::Mutex;

use super::{rank, upsert, LeaderboardEntry, ScoreStore, StoreError};

/// Process-local store, also the default backend in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<LeaderboardEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored entry in insertion order
    pub fn entries(&self) -> Vec<LeaderboardEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ScoreStore for MemoryStore {
    fn submit(&self, entry: LeaderboardEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        upsert(&mut entries, entry);
        Ok(())
    }

    fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rank(entries.clone(), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PlayerId;

    fn entry(id: &str, score: u64) -> LeaderboardEntry {
        LeaderboardEntry::new(PlayerId::parse(id).unwrap(), score)
    }

    #[test]
    fn repeated_submission_keeps_one_entry() {
        let store = MemoryStore::new();
        store.submit(entry("p1", 5)).unwrap();
        store.submit(entry("p1", 5)).unwrap();

        assert_eq!(store.entries(), vec![entry("p1", 5)]);
    }

    #[test]
    fn top_is_ranked() {
        let store = MemoryStore::new();
        store.submit(entry("p1", 3)).unwrap();
        store.submit(entry("p2", 9)).unwrap();
        store.submit(entry("p3", 9)).unwrap();

        let top = store.top(2).unwrap();
        assert_eq!(top, vec![entry("p2", 9), entry("p3", 9)]);
    }
}
