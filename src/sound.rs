// Sound-effect cues emitted on round resolution.

use std::io::{self, Write};

/// Cue types for round outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Cue {
    Correct,
    Incorrect,
    TimedOut,
    /// Every fifth consecutive correct answer
    Milestone,
}

pub trait SoundEffects {
    fn play(&mut self, cue: Cue);
}

/// Plays nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl SoundEffects for Silent {
    fn play(&mut self, _cue: Cue) {}
}

/// Rings the terminal bell on misses and timeouts
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl SoundEffects for TerminalBell {
    fn play(&mut self, cue: Cue) {
        if matches!(cue, Cue::Incorrect | Cue::TimedOut) {
            let mut out = io::stdout();
            let _ = out.write_all(b"\x07");
            let _ = out.flush();
        }
    }
}

/// Keeps every cue it is asked to play; used by headless runs and tests
#[derive(Debug, Default, Clone)]
pub struct CueLog {
    played: std::sync::Arc<std::sync::Mutex<Vec<Cue>>>,
}

impl CueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the cues played so far
    pub fn drain(&self) -> Vec<Cue> {
        self.played
            .lock()
            .map(|mut played| std::mem::take(&mut *played))
            .unwrap_or_default()
    }
}

impl SoundEffects for CueLog {
    fn play(&mut self, cue: Cue) {
        if let Ok(mut played) = self.played.lock() {
            played.push(cue);
        }
    }
}
