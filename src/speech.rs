use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::timer::Notifier;

/// Programs tried, in order, when no explicit speech command is configured
const KNOWN_PROGRAMS: &[&str] = &["espeak-ng", "espeak", "say", "spd-say"];

const POLL_INTERVAL_MS: u64 = 20;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("no text-to-speech program available")]
    Unavailable,
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Pronounces words. `speak` returns immediately; `on_finished` runs when the
/// utterance ends on its own. A cancelled utterance never runs its callback.
pub trait SpeechOutput {
    fn speak(&mut self, word: &str, on_finished: Notifier) -> Result<(), SpeechError>;
    fn cancel(&mut self);
}

/// Speech that finishes instantly, for `--mute` and tests
#[derive(Debug, Default, Clone, Copy)]
pub struct MuteSpeech;

impl SpeechOutput for MuteSpeech {
    fn speak(&mut self, _word: &str, on_finished: Notifier) -> Result<(), SpeechError> {
        on_finished();
        Ok(())
    }

    fn cancel(&mut self) {}
}

/// Stand-in used when no TTS program could be found
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSpeech;

impl SpeechOutput for UnavailableSpeech {
    fn speak(&mut self, _word: &str, _on_finished: Notifier) -> Result<(), SpeechError> {
        Err(SpeechError::Unavailable)
    }

    fn cancel(&mut self) {}
}

struct Utterance {
    child: Child,
    cancelled: Arc<AtomicBool>,
}

/// Speaks through an external program, passing the word as the last argument
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    current: Arc<Mutex<Option<Utterance>>>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Parse a configured command line such as `"espeak -s 120"`
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    /// Look for a known TTS program on PATH
    pub fn detect() -> Option<Self> {
        let path = std::env::var_os("PATH")?;
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();

        KNOWN_PROGRAMS
            .iter()
            .find(|program| dirs.iter().any(|dir| is_executable(&dir.join(program))))
            .map(|program| Self::new(*program, Vec::new()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl SpeechOutput for CommandSpeech {
    fn speak(&mut self, word: &str, on_finished: Notifier) -> Result<(), SpeechError> {
        self.cancel();

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(word)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        debug!("speaking via {} (pid {})", self.program, child.id());

        let cancelled = Arc::new(AtomicBool::new(false));
        if let Ok(mut slot) = self.current.lock() {
            *slot = Some(Utterance {
                child,
                cancelled: Arc::clone(&cancelled),
            });
        }

        let current = Arc::clone(&self.current);
        thread::spawn(move || loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            let finished = match current.lock() {
                Ok(mut slot) => match slot.as_mut() {
                    Some(utt) if Arc::ptr_eq(&utt.cancelled, &cancelled) => {
                        match utt.child.try_wait() {
                            Ok(Some(_)) => {
                                *slot = None;
                                true
                            }
                            Ok(None) => false,
                            Err(e) => {
                                warn!("lost track of speech process: {}", e);
                                *slot = None;
                                true
                            }
                        }
                    }
                    // replaced by a newer utterance
                    _ => break,
                },
                Err(_) => break,
            };

            if finished {
                if !cancelled.load(Ordering::SeqCst) {
                    on_finished();
                }
                break;
            }

            thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
        });

        Ok(())
    }

    fn cancel(&mut self) {
        if let Ok(mut slot) = self.current.lock() {
            if let Some(mut utt) = slot.take() {
                utt.cancelled.store(true, Ordering::SeqCst);
                let _ = utt.child.kill();
                let _ = utt.child.wait();
            }
        }
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Pick a speech backend from configuration
pub fn select_speech(command: Option<&str>, mute: bool) -> Box<dyn SpeechOutput> {
    if mute {
        return Box::new(MuteSpeech);
    }

    let configured = command.and_then(CommandSpeech::from_command_line);
    match configured.or_else(CommandSpeech::detect) {
        Some(speech) => {
            debug!("using {} for speech", speech.program());
            Box::new(speech)
        }
        None => {
            warn!("no text-to-speech program found, rounds will start without audio");
            Box::new(UnavailableSpeech)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn mute_speech_completes_immediately() {
        let (tx, rx) = mpsc::channel();
        let mut speech = MuteSpeech;
        speech
            .speak("galaxy", Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn unavailable_speech_reports_error() {
        let mut speech = UnavailableSpeech;
        let result = speech.speak("galaxy", Box::new(|| {}));
        assert!(matches!(result, Err(SpeechError::Unavailable)));
    }

    #[test]
    fn command_line_parsing() {
        let speech = CommandSpeech::from_command_line("espeak -s 120").unwrap();
        assert_eq!(speech.program, "espeak");
        assert_eq!(speech.args, vec!["-s".to_string(), "120".to_string()]);

        assert!(CommandSpeech::from_command_line("   ").is_none());
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let mut speech = CommandSpeech::new("wordmint-no-such-tts-binary", Vec::new());
        let result = speech.speak("galaxy", Box::new(|| {}));
        assert!(matches!(result, Err(SpeechError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn finished_process_runs_callback() {
        let (tx, rx) = mpsc::channel();
        // `true` ignores its argument and exits straight away
        let mut speech = CommandSpeech::new("true", Vec::new());
        speech
            .speak("galaxy", Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_process_skips_callback() {
        let (tx, rx) = mpsc::channel();
        let mut speech = CommandSpeech::new("sleep", Vec::new());
        speech
            .speak("5", Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        speech.cancel();
        speech.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn mute_flag_wins_over_configured_command() {
        let (tx, rx) = mpsc::channel();
        let mut speech = select_speech(Some("espeak"), true);
        speech
            .speak("galaxy", Box::new(move || tx.send(()).unwrap()))
            .unwrap();
        assert!(rx.try_recv().is_ok());
    }
}
