use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use log::{debug, warn};

use crate::runtime::GameEvent;
use crate::store::{LeaderboardEntry, ScoreStore};

/// Fire-and-forget score submission. Implementations must return without
/// waiting on the network; outcomes are reported out of band.
pub trait ScoreSubmitter {
    fn submit(&self, entry: LeaderboardEntry);
}

/// Runs each write on a worker thread and posts `GameEvent::ScoreSubmitted`
/// back into the game loop. In-flight writes are never cancelled, so a write
/// from an earlier round may land after a later one.
pub struct BackgroundSubmitter {
    store: Arc<dyn ScoreStore>,
    events: Sender<GameEvent>,
}

impl BackgroundSubmitter {
    pub fn new(store: Arc<dyn ScoreStore>, events: Sender<GameEvent>) -> Self {
        Self { store, events }
    }
}

impl ScoreSubmitter for BackgroundSubmitter {
    fn submit(&self, entry: LeaderboardEntry) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();

        thread::spawn(move || {
            let player = entry.player_id.clone();
            let result = store.submit(entry).map_err(|e| e.to_string());
            match &result {
                Ok(()) => debug!("score saved for {}", player),
                Err(e) => warn!("score for {} was not saved: {}", player, e),
            }
            let _ = events.send(GameEvent::ScoreSubmitted(result));
        });
    }
}

/// Writes synchronously on the caller's thread; for headless runs
pub struct InlineSubmitter {
    store: Arc<dyn ScoreStore>,
}

impl InlineSubmitter {
    pub fn new(store: Arc<dyn ScoreStore>) -> Self {
        Self { store }
    }
}

impl ScoreSubmitter for InlineSubmitter {
    fn submit(&self, entry: LeaderboardEntry) {
        if let Err(e) = self.store.submit(entry) {
            warn!("score was not saved: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PlayerId;
    use crate::store::{MemoryStore, StoreError};
    use std::sync::mpsc;
    use std::time::Duration;

    struct BrokenStore;

    impl ScoreStore for BrokenStore {
        fn submit(&self, _entry: LeaderboardEntry) -> Result<(), StoreError> {
            Err(StoreError::Rejected {
                status: 503,
                message: "down".into(),
            })
        }

        fn top(&self, _limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
            Ok(vec![])
        }
    }

    fn entry(score: u64) -> LeaderboardEntry {
        LeaderboardEntry::new(PlayerId::parse("p1").unwrap(), score)
    }

    #[test]
    fn background_success_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = mpsc::channel();
        BackgroundSubmitter::new(store.clone(), tx).submit(entry(3));

        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(GameEvent::ScoreSubmitted(Ok(()))) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(store.entries(), vec![entry(3)]);
    }

    #[test]
    fn background_failure_is_reported_not_raised() {
        let (tx, rx) = mpsc::channel();
        BackgroundSubmitter::new(Arc::new(BrokenStore), tx).submit(entry(3));

        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(GameEvent::ScoreSubmitted(Err(message))) => assert!(message.contains("503")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn inline_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        InlineSubmitter::new(store.clone()).submit(entry(1));
        assert_eq!(store.entries().len(), 1);

        // failures are swallowed
        InlineSubmitter::new(Arc::new(BrokenStore)).submit(entry(1));
    }
}
