use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{info, warn};

use crate::identity::{Identity, IdentityChange};
use crate::leaderboard::LeaderboardFeed;
use crate::round::{Outcome, Resolution, RoundController, RoundNotice, RoundState};
use crate::runtime::GameEvent;
use crate::session::SessionTally;
use crate::stats::{PlayerSummary, RoundRecord, StatsDb, ANONYMOUS};

const MOST_MISSED_SHOWN: usize = 5;

const LEADERBOARD_WARNING: &str = "Leaderboard unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Game,
    Leaderboard,
    Stats,
    SignIn,
}

/// Snapshot shown on the stats screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsView {
    pub player: String,
    pub summary: PlayerSummary,
    pub most_missed: Vec<(String, u64)>,
}

/// Everything the terminal front end owns for one session
pub struct App {
    pub state: AppState,
    pub controller: RoundController,
    pub feed: LeaderboardFeed,
    pub identity: Identity,
    pub tally: SessionTally,
    pub stats: Option<StatsDb>,
    pub stats_view: Option<StatsView>,
    pub last_resolution: Option<Resolution>,
    pub warning: Option<String>,
    pub sign_in_input: String,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        mut controller: RoundController,
        feed: LeaderboardFeed,
        identity: Identity,
        stats: Option<StatsDb>,
    ) -> Self {
        controller.set_player(identity.player().cloned());
        controller.set_username(identity.username().map(str::to_string));

        Self {
            state: AppState::Game,
            controller,
            feed,
            identity,
            tally: SessionTally::default(),
            stats,
            stats_view: None,
            last_resolution: None,
            warning: None,
            sign_in_input: String::new(),
            should_quit: false,
        }
    }

    /// First leaderboard read
    pub fn mount(&mut self) {
        self.feed.refresh();
        self.sync_feed_warning();
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warning = Some(message.into());
    }

    /// Mirror the feed's error into the warning line; a good read clears it
    fn sync_feed_warning(&mut self) {
        match self.feed.last_error() {
            Some(e) => self.warning = Some(format!("{}: {}", LEADERBOARD_WARNING, e)),
            None => {
                let stale = self
                    .warning
                    .as_deref()
                    .is_some_and(|w| w.starts_with(LEADERBOARD_WARNING));
                if stale {
                    self.warning = None;
                }
            }
        }
    }

    pub fn handle_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::Key(key) => self.on_key(key),
            GameEvent::Resize => {}
            GameEvent::Tick => {
                if self.feed.on_tick(Instant::now()) {
                    self.sync_feed_warning();
                }
            }
            GameEvent::Round(signal) => self.controller.on_signal(signal),
            GameEvent::Notice(notice) => self.on_notice(notice),
            GameEvent::ScoreSubmitted(Ok(())) => {
                if self.feed.refresh() {
                    self.sync_feed_warning();
                }
            }
            GameEvent::ScoreSubmitted(Err(e)) => {
                self.warn(format!("Score not saved: {}", e));
            }
            GameEvent::LeaderboardLoaded(result) => {
                self.feed.apply(result);
                self.sync_feed_warning();
            }
        }
    }

    pub fn on_notice(&mut self, notice: RoundNotice) {
        match notice {
            RoundNotice::Warning(message) => self.warn(message),
            RoundNotice::Listening { .. } => {}
            RoundNotice::Resolved(resolution) => {
                self.tally.record(resolution.outcome);
                if let Some(db) = &self.stats {
                    if let Err(e) = db.record_round(&RoundRecord::from_resolution(&resolution)) {
                        warn!("failed to record round history: {}", e);
                    }
                }
                if resolution.outcome == Outcome::Correct && !resolution.score_submitted {
                    info!("correct answer not submitted: no player signed in");
                }
                self.last_resolution = Some(resolution);
            }
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.state {
            AppState::Game => self.on_game_key(key, ctrl),
            AppState::Leaderboard => match key.code {
                KeyCode::Esc => self.state = AppState::Game,
                KeyCode::Char('l') if ctrl => self.state = AppState::Game,
                KeyCode::Char('r') => {
                    self.feed.refresh();
                    self.sync_feed_warning();
                }
                _ => {}
            },
            AppState::Stats => match key.code {
                KeyCode::Esc => self.state = AppState::Game,
                KeyCode::Char('s') if ctrl => self.state = AppState::Game,
                KeyCode::Char('x') if ctrl => self.clear_stats(),
                _ => {}
            },
            AppState::SignIn => self.on_sign_in_key(key),
        }
    }

    fn on_game_key(&mut self, key: KeyEvent, ctrl: bool) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                if self.controller.state() == RoundState::Awaiting {
                    self.controller.submit();
                } else if self.controller.can_start_round() {
                    self.warning = None;
                    if let Err(e) = self.controller.start_round() {
                        warn!("could not start round: {}", e);
                    }
                }
            }
            KeyCode::Backspace => {
                self.controller.backspace();
            }
            KeyCode::Char(c) if ctrl => match c {
                'r' => {
                    self.controller.replay();
                }
                'u' => {
                    self.controller.clear_input();
                }
                'l' => {
                    self.state = AppState::Leaderboard;
                    self.feed.refresh();
                    self.sync_feed_warning();
                }
                's' => self.open_stats(),
                'p' => {
                    self.sign_in_input = self
                        .identity
                        .player()
                        .map(|p| p.to_string())
                        .unwrap_or_default();
                    self.state = AppState::SignIn;
                }
                _ => {}
            },
            KeyCode::Char(c) => {
                self.controller.type_char(c);
            }
            _ => {}
        }
    }

    fn on_sign_in_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state = AppState::Game,
            KeyCode::Backspace => {
                self.sign_in_input.pop();
            }
            KeyCode::Enter => {
                let raw = std::mem::take(&mut self.sign_in_input);
                self.submit_sign_in(&raw);
                self.state = AppState::Game;
            }
            KeyCode::Char(c) if !c.is_control() => self.sign_in_input.push(c),
            _ => {}
        }
    }

    /// `"<player id> [display name]"`; blank input signs out
    pub fn submit_sign_in(&mut self, raw: &str) {
        let raw = raw.trim();
        if raw.is_empty() {
            if let Some(change) = self.identity.sign_out() {
                self.apply_identity_change(&change);
            }
            return;
        }

        let (id, username) = match raw.split_once(char::is_whitespace) {
            Some((id, name)) => (id, Some(name.to_string())),
            None => (raw, None),
        };

        match self.identity.sign_in(id) {
            Ok(Some(change)) => self.apply_identity_change(&change),
            Ok(None) => {}
            Err(e) => {
                self.warn(format!("Cannot sign in: {}", e));
                return;
            }
        }
        self.identity.set_username(username);
        self.controller
            .set_username(self.identity.username().map(str::to_string));
    }

    fn apply_identity_change(&mut self, change: &IdentityChange) {
        info!(
            "identity changed: {}",
            change.player().map_or("signed out".to_string(), |p| p.to_string())
        );
        self.controller.apply_identity(change);
        self.stats_view = None;
    }

    pub fn open_stats(&mut self) {
        self.stats_view = self.load_stats_view();
        self.state = AppState::Stats;
    }

    /// Wipe the current player's round history and reload the view
    pub fn clear_stats(&mut self) {
        let player = self.stats_player();
        let Some(db) = &self.stats else {
            return;
        };
        match db.clear_player(&player) {
            Ok(()) => info!("cleared round history for {}", player),
            Err(e) => {
                warn!("failed to clear stats: {}", e);
                self.warn(format!("Stats not cleared: {}", e));
            }
        }
        self.stats_view = self.load_stats_view();
    }

    fn stats_player(&self) -> String {
        self.identity
            .player()
            .map_or(ANONYMOUS.to_string(), |p| p.to_string())
    }

    fn load_stats_view(&mut self) -> Option<StatsView> {
        let player = self.stats_player();
        let db = self.stats.as_ref()?;

        let loaded = db
            .summary(&player)
            .and_then(|summary| Ok((summary, db.most_missed(&player, MOST_MISSED_SHOWN)?)));

        match loaded {
            Ok((summary, most_missed)) => Some(StatsView {
                player,
                summary,
                most_missed,
            }),
            Err(e) => {
                warn!("failed to load stats: {}", e);
                self.warn(format!("Stats unavailable: {}", e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::NoticeLog;
    use crate::speech::MuteSpeech;
    use crate::store::{MemoryStore, ScoreStore};
    use crate::submit::InlineSubmitter;
    use crate::timer::ManualScheduler;
    use crate::words::WordList;
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        app: App,
        sched: ManualScheduler,
        notices: NoticeLog,
        store: Arc<MemoryStore>,
    }

    fn fixture(identity: Identity) -> Fixture {
        let sched = ManualScheduler::new();
        let notices = NoticeLog::new();
        let store = Arc::new(MemoryStore::new());
        let controller = RoundController::new(
            WordList::new(vec!["galaxy".to_string()]),
            Box::new(sched.clone()),
            Box::new(notices.clone()),
        )
        .with_speech(Box::new(MuteSpeech))
        .with_submitter(Box::new(InlineSubmitter::new(store.clone())));

        let feed = LeaderboardFeed::inline(store.clone(), Duration::from_secs(15), 10);
        let app = App::new(controller, feed, identity, Some(StatsDb::in_memory().unwrap()));

        Fixture {
            app,
            sched,
            notices,
            store,
        }
    }

    impl Fixture {
        fn key(&mut self, code: KeyCode) {
            self.app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
        }

        fn ctrl(&mut self, c: char) {
            self.app
                .on_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
        }

        fn type_str(&mut self, s: &str) {
            for c in s.chars() {
                self.key(KeyCode::Char(c));
            }
        }

        /// Route signals and notices the way the game loop does
        fn settle(&mut self) {
            for signal in self.sched.take_notified() {
                self.app.handle_event(GameEvent::Round(signal));
            }
            for notice in self.notices.drain() {
                self.app.handle_event(GameEvent::Notice(notice));
            }
        }

        fn play(&mut self, answer: &str) {
            self.key(KeyCode::Enter);
            self.settle();
            self.type_str(answer);
            self.key(KeyCode::Enter);
            self.settle();
        }
    }

    #[test]
    fn enter_starts_then_submits() {
        let mut f = fixture(Identity::anonymous());
        f.play("galaxy");

        assert_eq!(f.app.controller.state(), RoundState::Resolved);
        assert_eq!(
            f.app.last_resolution.as_ref().map(|r| r.outcome),
            Some(Outcome::Correct)
        );
        assert_eq!(f.app.tally.summary_line(), "1/1 (100%)");
        assert!(f.store.entries().is_empty());
    }

    #[test]
    fn sign_in_prompt_enables_submission() {
        let mut f = fixture(Identity::anonymous());
        f.ctrl('p');
        assert_eq!(f.app.state, AppState::SignIn);
        f.type_str("p1 Ada");
        f.key(KeyCode::Enter);

        assert_eq!(f.app.state, AppState::Game);
        assert!(f.app.controller.can_submit_score());

        f.play("galaxy");
        let entries = f.store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].username.as_deref(), Some("Ada"));

        f.app.mount();
        assert_eq!(
            f.app
                .feed
                .rank_of(f.app.identity.player().unwrap()),
            Some(1)
        );
    }

    #[test]
    fn blank_sign_in_signs_out() {
        let mut f = fixture(Identity::resolve(Some("p1")));
        assert!(f.app.controller.can_submit_score());

        f.app.submit_sign_in("   ");
        assert!(!f.app.identity.is_signed_in());
        assert!(!f.app.controller.can_submit_score());
    }

    #[test]
    fn screens_toggle_and_escape_back() {
        let mut f = fixture(Identity::anonymous());
        f.ctrl('l');
        assert_eq!(f.app.state, AppState::Leaderboard);
        f.key(KeyCode::Esc);
        assert_eq!(f.app.state, AppState::Game);
        assert!(!f.app.should_quit);

        f.key(KeyCode::Esc);
        assert!(f.app.should_quit);
    }

    #[test]
    fn stats_screen_reflects_history() {
        let mut f = fixture(Identity::anonymous());
        f.play("galaxy");
        f.play("nope");

        f.ctrl('s');
        assert_eq!(f.app.state, AppState::Stats);
        let view = f.app.stats_view.clone().unwrap();
        assert_eq!(view.player, ANONYMOUS);
        assert_eq!(view.summary.rounds, 2);
        assert_eq!(view.most_missed, vec![("galaxy".to_string(), 1)]);
    }

    #[test]
    fn failed_submission_surfaces_warning() {
        let mut f = fixture(Identity::anonymous());
        f.app
            .handle_event(GameEvent::ScoreSubmitted(Err("offline".into())));
        assert_eq!(f.app.warning.as_deref(), Some("Score not saved: offline"));
    }

    #[test]
    fn ctrl_c_quits_from_any_screen() {
        let mut f = fixture(Identity::anonymous());
        f.ctrl('p');
        f.ctrl('c');
        assert!(f.app.should_quit);
    }

    #[test]
    fn leaderboard_load_failure_keeps_cache() {
        let mut f = fixture(Identity::anonymous());
        f.store
            .submit(crate::store::LeaderboardEntry::new(
                crate::identity::PlayerId::parse("p9").unwrap(),
                4,
            ))
            .unwrap();
        f.app.mount();
        assert_eq!(f.app.feed.entries().len(), 1);

        f.app
            .handle_event(GameEvent::LeaderboardLoaded(Err("timeout".into())));
        assert_eq!(f.app.feed.entries().len(), 1);
        assert!(f.app.warning.as_deref().unwrap().contains("timeout"));
    }

    #[test]
    fn good_read_clears_leaderboard_warning_only() {
        let mut f = fixture(Identity::anonymous());
        f.app
            .handle_event(GameEvent::LeaderboardLoaded(Err("timeout".into())));
        assert!(f.app.warning.is_some());

        f.app.handle_event(GameEvent::LeaderboardLoaded(Ok(Vec::new())));
        assert_eq!(f.app.warning, None);

        f.app.warn("Speech unavailable");
        f.app.handle_event(GameEvent::LeaderboardLoaded(Ok(Vec::new())));
        assert_eq!(f.app.warning.as_deref(), Some("Speech unavailable"));
    }

    #[test]
    fn saved_score_refreshes_leaderboard() {
        let mut f = fixture(Identity::resolve(Some("p1")));
        f.play("galaxy");
        assert_eq!(f.store.entries().len(), 1);
        assert!(f.app.feed.entries().is_empty());

        f.app.handle_event(GameEvent::ScoreSubmitted(Ok(())));
        let player = f.app.identity.player().cloned().unwrap();
        assert_eq!(f.app.feed.rank_of(&player), Some(1));
        assert_eq!(f.app.feed.entries()[0].score, 1);
    }

    #[test]
    fn saved_score_starts_background_read() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut f = fixture(Identity::anonymous());
        f.app.feed =
            LeaderboardFeed::background(f.store.clone(), tx, Duration::from_secs(15), 10);

        f.app.handle_event(GameEvent::ScoreSubmitted(Ok(())));
        assert!(f.app.feed.is_loading());
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(5)),
            Ok(GameEvent::LeaderboardLoaded(Ok(_)))
        ));
    }

    #[test]
    fn clearing_stats_empties_history() {
        let mut f = fixture(Identity::anonymous());
        f.play("galaxy");
        f.ctrl('s');
        assert_eq!(f.app.stats_view.as_ref().unwrap().summary.rounds, 1);

        f.ctrl('x');
        assert_eq!(f.app.state, AppState::Stats);
        assert_eq!(f.app.stats_view.as_ref().unwrap().summary.rounds, 0);
    }

    #[test]
    fn enter_is_ignored_while_word_is_spoken() {
        let mut f = fixture(Identity::anonymous());
        f.key(KeyCode::Enter);
        assert_eq!(f.app.controller.state(), RoundState::Speaking);

        f.key(KeyCode::Enter);
        assert_eq!(f.app.controller.state(), RoundState::Speaking);
        assert!(f
            .notices
            .drain()
            .iter()
            .all(|n| !matches!(n, RoundNotice::Resolved(_))));
    }
}
