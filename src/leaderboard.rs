use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::identity::PlayerId;
use crate::runtime::GameEvent;
use crate::store::{rank, LeaderboardEntry, ScoreStore};

pub const DEFAULT_REFRESH_SECS: u64 = 15;

/// Cached top-N view of a score store, refreshed on an interval.
///
/// At most one read is outstanding at a time. A failed read keeps the last
/// good snapshot and records a warning instead.
pub struct LeaderboardFeed {
    store: Arc<dyn ScoreStore>,
    events: Option<Sender<GameEvent>>,
    limit: usize,
    interval: Duration,
    entries: Vec<LeaderboardEntry>,
    in_flight: bool,
    last_request: Option<Instant>,
    last_error: Option<String>,
}

impl LeaderboardFeed {
    /// Reads run on a worker thread and come back as `GameEvent::LeaderboardLoaded`
    pub fn background(
        store: Arc<dyn ScoreStore>,
        events: Sender<GameEvent>,
        interval: Duration,
        limit: usize,
    ) -> Self {
        Self::build(store, Some(events), interval, limit)
    }

    /// Reads complete on the caller's thread
    pub fn inline(store: Arc<dyn ScoreStore>, interval: Duration, limit: usize) -> Self {
        Self::build(store, None, interval, limit)
    }

    fn build(
        store: Arc<dyn ScoreStore>,
        events: Option<Sender<GameEvent>>,
        interval: Duration,
        limit: usize,
    ) -> Self {
        Self {
            store,
            events,
            limit,
            interval,
            entries: Vec::new(),
            in_flight: false,
            last_request: None,
            last_error: None,
        }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// 1-based position of `player` in the cached snapshot
    pub fn rank_of(&self, player: &PlayerId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| &e.player_id == player)
            .map(|idx| idx + 1)
    }

    /// Start a read unless one is already outstanding. Returns whether a read
    /// was started.
    pub fn refresh(&mut self) -> bool {
        if self.in_flight {
            debug!("leaderboard refresh skipped, previous read still running");
            return false;
        }
        self.in_flight = true;
        self.last_request = Some(Instant::now());

        let store = Arc::clone(&self.store);
        let limit = self.limit;

        match &self.events {
            Some(events) => {
                let events = events.clone();
                thread::spawn(move || {
                    let result = store.top(limit).map_err(|e| e.to_string());
                    let _ = events.send(GameEvent::LeaderboardLoaded(result));
                });
            }
            None => {
                let result = store.top(limit).map_err(|e| e.to_string());
                self.apply(result);
            }
        }
        true
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_request {
            Some(at) => now.saturating_duration_since(at) >= self.interval,
            None => true,
        }
    }

    /// Periodic hook from the game loop
    pub fn on_tick(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.refresh()
        } else {
            false
        }
    }

    pub fn apply(&mut self, result: Result<Vec<LeaderboardEntry>, String>) {
        self.in_flight = false;
        match result {
            Ok(entries) => {
                self.entries = rank(entries, self.limit);
                self.last_error = None;
            }
            Err(e) => {
                warn!("failed to load leaderboard: {}", e);
                self.last_error = Some(e);
            }
        }
    }
}
