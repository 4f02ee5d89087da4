use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::identity::{IdentityChange, PlayerId};
use crate::runtime::GameEvent;
use crate::sound::{Cue, Silent, SoundEffects};
use crate::speech::{MuteSpeech, SpeechOutput};
use crate::store::LeaderboardEntry;
use crate::submit::ScoreSubmitter;
use crate::timer::{Generation, RoundSignal, Scheduler, TimerHandle};
use crate::words::WordList;

pub const DEFAULT_ROUND_SECS: u32 = 30;
pub const MILESTONE_EVERY: u32 = 5;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum RoundState {
    #[default]
    Idle,
    Speaking,
    Awaiting,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Outcome {
    Correct,
    Incorrect,
    TimedOut,
}

#[derive(Debug, Error, PartialEq)]
pub enum RoundError {
    #[error("no words available to start a round")]
    NoWords,
    #[error("a round is already in progress")]
    RoundInProgress,
}

/// Lowercase and trim surrounding whitespace
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

pub fn is_correct(input: &str, word: &str) -> bool {
    normalize(input) == normalize(word)
}

/// One "hear a word, type it, get judged" cycle
#[derive(Debug, Clone, Default)]
pub struct Round {
    word: String,
    state: RoundState,
    input: String,
    remaining_secs: u32,
    outcome: Option<Outcome>,
    generation: Generation,
    awaiting_since: Option<Instant>,
    answered_after: Option<Duration>,
}

impl Round {
    fn speaking(word: String, generation: Generation, secs: u32) -> Self {
        Self {
            word,
            state: RoundState::Speaking,
            remaining_secs: secs,
            generation,
            ..Self::default()
        }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Time between input opening and resolution
    pub fn answered_after(&self) -> Option<Duration> {
        self.answered_after
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, RoundState::Speaking | RoundState::Awaiting)
    }
}

/// Consecutive correct rounds in this session
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Streak {
    current: u32,
    best: u32,
}

impl Streak {
    pub fn record(&mut self, outcome: Outcome) -> u32 {
        match outcome {
            Outcome::Correct => {
                self.current += 1;
                self.best = self.best.max(self.current);
            }
            Outcome::Incorrect | Outcome::TimedOut => self.current = 0,
        }
        self.current
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn best(&self) -> u32 {
        self.best
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub word: String,
    pub input: String,
    pub outcome: Outcome,
    pub streak: u32,
    pub player: Option<PlayerId>,
    pub score_submitted: bool,
    pub answered_after: Option<Duration>,
}

impl Resolution {
    pub fn message(&self) -> String {
        match self.outcome {
            Outcome::Correct => format!("Correct! The word was \"{}\".", self.word),
            Outcome::Incorrect => format!("Wrong! The word was \"{}\".", self.word),
            Outcome::TimedOut => format!("Time's up! The word was \"{}\".", self.word),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundNotice {
    /// Non-fatal problem the player should see
    Warning(String),
    /// Input is open and the countdown is running
    Listening { generation: Generation },
    Resolved(Resolution),
}

/// Receives controller notices for the UI
pub trait RoundSink {
    fn notify(&self, notice: RoundNotice);
}

impl RoundSink for Sender<GameEvent> {
    fn notify(&self, notice: RoundNotice) {
        let _ = self.send(GameEvent::Notice(notice));
    }
}

/// In-memory sink; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    notices: Arc<Mutex<Vec<RoundNotice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<RoundNotice> {
        self.notices
            .lock()
            .map(|mut n| std::mem::take(&mut *n))
            .unwrap_or_default()
    }
}

impl RoundSink for NoticeLog {
    fn notify(&self, notice: RoundNotice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundSettings {
    pub round_secs: u32,
    /// Delay before input opens when speech is unavailable
    pub speech_fallback: Duration,
    /// Longest wait for speech to report completion
    pub speech_timeout: Duration,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            round_secs: DEFAULT_ROUND_SECS,
            speech_fallback: Duration::from_millis(1500),
            speech_timeout: Duration::from_secs(10),
        }
    }
}

/// Owns the round lifecycle for one player session:
/// Idle -> Speaking -> Awaiting -> Resolved -> Speaking ...
///
/// Driven by serialized calls (`start_round`, `type_char`, `submit`) and by
/// `on_signal` for timer ticks and speech completion. Every subscription is
/// tagged with the round's generation and cancelled on the way out of the
/// state that created it.
pub struct RoundController {
    settings: RoundSettings,
    words: WordList,
    rng: StdRng,
    scheduler: Box<dyn Scheduler>,
    speech: Box<dyn SpeechOutput>,
    sound: Box<dyn SoundEffects>,
    submitter: Option<Box<dyn ScoreSubmitter>>,
    sink: Box<dyn RoundSink>,
    player: Option<PlayerId>,
    username: Option<String>,
    round: Round,
    streak: Streak,
    generation: Generation,
    countdown: Option<TimerHandle>,
    speech_deadline: Option<TimerHandle>,
}

impl RoundController {
    pub fn new(
        words: WordList,
        scheduler: Box<dyn Scheduler>,
        sink: Box<dyn RoundSink>,
    ) -> Self {
        Self {
            settings: RoundSettings::default(),
            words,
            rng: StdRng::from_entropy(),
            scheduler,
            speech: Box::new(MuteSpeech),
            sound: Box::new(Silent),
            submitter: None,
            sink,
            player: None,
            username: None,
            round: Round::default(),
            streak: Streak::default(),
            generation: Generation::default(),
            countdown: None,
            speech_deadline: None,
        }
    }

    pub fn with_settings(mut self, settings: RoundSettings) -> Self {
        self.settings = RoundSettings {
            round_secs: settings.round_secs.max(1),
            ..settings
        };
        self
    }

    pub fn with_speech(mut self, speech: Box<dyn SpeechOutput>) -> Self {
        self.speech = speech;
        self
    }

    pub fn with_sound(mut self, sound: Box<dyn SoundEffects>) -> Self {
        self.sound = sound;
        self
    }

    pub fn with_submitter(mut self, submitter: Box<dyn ScoreSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn with_player(mut self, player: Option<PlayerId>) -> Self {
        self.player = player;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn state(&self) -> RoundState {
        self.round.state
    }

    pub fn input(&self) -> &str {
        &self.round.input
    }

    pub fn remaining_secs(&self) -> u32 {
        self.round.remaining_secs
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.round.outcome
    }

    /// The target word, only once the round is over
    pub fn revealed_word(&self) -> Option<&str> {
        (self.round.state == RoundState::Resolved).then_some(self.round.word.as_str())
    }

    pub fn streak(&self) -> Streak {
        self.streak
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn settings(&self) -> &RoundSettings {
        &self.settings
    }

    pub fn player(&self) -> Option<&PlayerId> {
        self.player.as_ref()
    }

    /// False means the UI should prompt for sign-in before scores count
    pub fn can_submit_score(&self) -> bool {
        self.player.is_some() && self.submitter.is_some()
    }

    pub fn can_start_round(&self) -> bool {
        !self.round.is_live()
    }

    pub fn set_player(&mut self, player: Option<PlayerId>) {
        debug!(
            "player changed to {}",
            player.as_ref().map_or("<none>", PlayerId::as_str)
        );
        self.player = player;
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn apply_identity(&mut self, change: &IdentityChange) {
        self.set_player(change.player());
        self.username = None;
    }

    /// Pick a word and ask speech output to pronounce it.
    ///
    /// Rejected while a round is live. An empty word list leaves the
    /// controller Idle.
    pub fn start_round(&mut self) -> Result<Generation, RoundError> {
        if self.round.is_live() {
            return Err(RoundError::RoundInProgress);
        }

        self.cancel_subscriptions();
        self.speech.cancel();

        let word = match self.words.choose(&mut self.rng) {
            Some(word) => word.to_string(),
            None => {
                warn!("cannot start a round: word list is empty");
                self.round = Round::default();
                self.sink.notify(RoundNotice::Warning(
                    "No words available, cannot start a round".to_string(),
                ));
                return Err(RoundError::NoWords);
            }
        };

        self.generation = self.generation.next();
        let generation = self.generation;
        self.round = Round::speaking(word, generation, self.settings.round_secs);
        debug!("round {} started", generation.0);

        let on_finished = self
            .scheduler
            .notifier(RoundSignal::SpeechFinished(generation));

        let deadline = match self.speech.speak(&self.round.word, on_finished) {
            Ok(()) => self.settings.speech_timeout,
            Err(e) => {
                warn!("speech failed: {}", e);
                self.sink.notify(RoundNotice::Warning(format!(
                    "Speech unavailable ({}), starting without audio",
                    e
                )));
                self.settings.speech_fallback
            }
        };
        self.speech_deadline = Some(
            self.scheduler
                .after(deadline, RoundSignal::SpeechFinished(generation)),
        );

        Ok(generation)
    }

    /// Apply a timer tick or speech completion. Signals from any round other
    /// than the current one are dropped.
    pub fn on_signal(&mut self, signal: RoundSignal) {
        if signal.generation() != self.generation {
            debug!(
                "dropping stale {:?} (current round {})",
                signal, self.generation.0
            );
            return;
        }

        match signal {
            RoundSignal::SpeechFinished(_) => {
                if self.round.state == RoundState::Speaking {
                    self.open_input();
                }
            }
            RoundSignal::Tick(_) => {
                if self.round.state == RoundState::Awaiting {
                    self.tick();
                }
            }
        }
    }

    fn open_input(&mut self) {
        if let Some(deadline) = self.speech_deadline.take() {
            deadline.cancel();
        }
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }

        self.round.state = RoundState::Awaiting;
        self.round.remaining_secs = self.settings.round_secs;
        self.round.awaiting_since = Some(Instant::now());
        self.countdown = Some(
            self.scheduler
                .every(COUNTDOWN_PERIOD, RoundSignal::Tick(self.generation)),
        );

        self.sink.notify(RoundNotice::Listening {
            generation: self.generation,
        });
    }

    fn tick(&mut self) {
        self.round.remaining_secs = self.round.remaining_secs.saturating_sub(1);
        if self.round.remaining_secs == 0 {
            self.resolve(Outcome::TimedOut);
        }
    }

    pub fn type_char(&mut self, c: char) -> bool {
        if self.round.state != RoundState::Awaiting || c.is_control() {
            return false;
        }
        self.round.input.push(c);
        true
    }

    pub fn backspace(&mut self) -> bool {
        if self.round.state != RoundState::Awaiting {
            return false;
        }
        self.round.input.pop().is_some()
    }

    pub fn clear_input(&mut self) -> bool {
        if self.round.state != RoundState::Awaiting {
            return false;
        }
        self.round.input.clear();
        true
    }

    /// Hear the current word again; the countdown keeps running
    pub fn replay(&mut self) -> bool {
        if self.round.state != RoundState::Awaiting {
            return false;
        }
        match self.speech.speak(&self.round.word, Box::new(|| {})) {
            Ok(()) => true,
            Err(e) => {
                warn!("replay failed: {}", e);
                self.sink
                    .notify(RoundNotice::Warning(format!("Cannot replay word: {}", e)));
                false
            }
        }
    }

    /// Judge the typed input. Only accepted while Awaiting; anything else is
    /// silently ignored and returns None.
    pub fn submit(&mut self) -> Option<Outcome> {
        if self.round.state != RoundState::Awaiting {
            return None;
        }

        let outcome = if is_correct(&self.round.input, &self.round.word) {
            Outcome::Correct
        } else {
            Outcome::Incorrect
        };
        self.resolve(outcome);
        Some(outcome)
    }

    fn resolve(&mut self, outcome: Outcome) {
        self.cancel_subscriptions();

        self.round.state = RoundState::Resolved;
        self.round.outcome = Some(outcome);
        self.round.answered_after = self.round.awaiting_since.map(|t| t.elapsed());

        let streak = self.streak.record(outcome);
        info!(
            "round {} resolved: {} (streak {})",
            self.generation.0, outcome, streak
        );

        match outcome {
            Outcome::Correct => {
                self.sound.play(Cue::Correct);
                if streak % MILESTONE_EVERY == 0 {
                    self.sound.play(Cue::Milestone);
                }
            }
            Outcome::Incorrect => self.sound.play(Cue::Incorrect),
            Outcome::TimedOut => self.sound.play(Cue::TimedOut),
        }

        let score_submitted = outcome == Outcome::Correct && self.submit_score(streak);

        self.sink.notify(RoundNotice::Resolved(Resolution {
            word: self.round.word.clone(),
            input: self.round.input.clone(),
            outcome,
            streak,
            player: self.player.clone(),
            score_submitted,
            answered_after: self.round.answered_after,
        }));
    }

    fn submit_score(&self, streak: u32) -> bool {
        match (&self.player, &self.submitter) {
            (Some(player), Some(submitter)) => {
                submitter.submit(
                    LeaderboardEntry::new(player.clone(), u64::from(streak))
                        .with_username(self.username.clone()),
                );
                true
            }
            _ => false,
        }
    }

    fn cancel_subscriptions(&mut self) {
        if let Some(countdown) = self.countdown.take() {
            countdown.cancel();
        }
        if let Some(deadline) = self.speech_deadline.take() {
            deadline.cancel();
        }
    }

    /// End of session: cancel every outstanding timer and utterance
    pub fn shutdown(&mut self) {
        self.cancel_subscriptions();
        self.speech.cancel();
    }
}

impl Drop for RoundController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
