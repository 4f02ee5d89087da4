use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::runtime::GameEvent;

/// Monotonic round counter. Every asynchronous callback carries the generation
/// of the round that scheduled it and is discarded when it no longer matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Asynchronous notifications scoped to a single round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundSignal {
    /// One second of countdown elapsed
    Tick(Generation),
    /// Speech output finished (or its fallback delay elapsed)
    SpeechFinished(Generation),
}

impl RoundSignal {
    pub fn generation(&self) -> Generation {
        match self {
            RoundSignal::Tick(g) | RoundSignal::SpeechFinished(g) => *g,
        }
    }
}

/// Callback handed to collaborators that finish on their own schedule
pub type Notifier = Box<dyn FnOnce() + Send + 'static>;

/// Cancelable subscription. Cancelling twice, or cancelling a one-shot timer
/// that already fired, is a no-op.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Source of delayed and repeating round signals
pub trait Scheduler {
    /// Deliver `signal` every `period` until the handle is cancelled
    fn every(&self, period: Duration, signal: RoundSignal) -> TimerHandle;
    /// Deliver `signal` once after `delay` unless the handle is cancelled first
    fn after(&self, delay: Duration, signal: RoundSignal) -> TimerHandle;
    /// Build a callback that delivers `signal` when invoked
    fn notifier(&self, signal: RoundSignal) -> Notifier;
}

/// Production scheduler: one sleeper thread per subscription, posting into the
/// game loop's event channel.
#[derive(Debug, Clone)]
pub struct ThreadScheduler {
    tx: Sender<GameEvent>,
}

impl ThreadScheduler {
    pub fn new(tx: Sender<GameEvent>) -> Self {
        Self { tx }
    }
}

impl Scheduler for ThreadScheduler {
    fn every(&self, period: Duration, signal: RoundSignal) -> TimerHandle {
        let handle = TimerHandle::new();
        let watch = handle.clone();
        let tx = self.tx.clone();

        thread::spawn(move || loop {
            thread::sleep(period);
            if watch.is_cancelled() || tx.send(GameEvent::Round(signal)).is_err() {
                break;
            }
        });

        handle
    }

    fn after(&self, delay: Duration, signal: RoundSignal) -> TimerHandle {
        let handle = TimerHandle::new();
        let watch = handle.clone();
        let tx = self.tx.clone();

        thread::spawn(move || {
            thread::sleep(delay);
            if !watch.is_cancelled() {
                let _ = tx.send(GameEvent::Round(signal));
            }
        });

        handle
    }

    fn notifier(&self, signal: RoundSignal) -> Notifier {
        let tx = self.tx.clone();
        Box::new(move || {
            let _ = tx.send(GameEvent::Round(signal));
        })
    }
}

#[derive(Debug)]
struct ManualTimer {
    due_ms: u64,
    period_ms: Option<u64>,
    signal: RoundSignal,
    handle: TimerHandle,
}

#[derive(Debug, Default)]
struct ManualClock {
    now_ms: u64,
    timers: Vec<ManualTimer>,
    notified: Vec<RoundSignal>,
}

/// Simulated-time scheduler for tests and headless driving.
///
/// Nothing fires on its own: `advance` moves the clock and returns the signals
/// that became due, in due order. Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_clock<T>(&self, f: impl FnOnce(&mut ManualClock) -> T) -> T {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn schedule(
        &self,
        delay: Duration,
        period: Option<Duration>,
        signal: RoundSignal,
    ) -> TimerHandle {
        let handle = TimerHandle::new();
        let timer_handle = handle.clone();
        self.with_clock(|clock| {
            clock.timers.push(ManualTimer {
                due_ms: clock.now_ms + delay.as_millis() as u64,
                period_ms: period.map(|p| (p.as_millis() as u64).max(1)),
                signal,
                handle: timer_handle,
            })
        });
        handle
    }

    /// Number of subscriptions that have not been cancelled or spent
    pub fn active_timers(&self) -> usize {
        self.with_clock(|clock| {
            clock
                .timers
                .iter()
                .filter(|t| !t.handle.is_cancelled())
                .count()
        })
    }

    /// Signals delivered through notifiers since the last call
    pub fn take_notified(&self) -> Vec<RoundSignal> {
        self.with_clock(|clock| std::mem::take(&mut clock.notified))
    }

    /// Move the clock forward and collect every signal that fell due
    pub fn advance(&self, by: Duration) -> Vec<RoundSignal> {
        self.with_clock(|clock| {
            let target = clock.now_ms + by.as_millis() as u64;
            let mut fired = Vec::new();

            loop {
                clock.timers.retain(|t| !t.handle.is_cancelled());

                let next = clock
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due_ms <= target)
                    .min_by_key(|(_, t)| t.due_ms)
                    .map(|(idx, _)| idx);

                let Some(idx) = next else { break };

                let timer = &mut clock.timers[idx];
                clock.now_ms = timer.due_ms;
                fired.push(timer.signal);

                match timer.period_ms {
                    Some(period) => timer.due_ms += period,
                    None => {
                        clock.timers.remove(idx);
                    }
                }
            }

            clock.now_ms = target;
            fired
        })
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, period: Duration, signal: RoundSignal) -> TimerHandle {
        self.schedule(period, Some(period), signal)
    }

    fn after(&self, delay: Duration, signal: RoundSignal) -> TimerHandle {
        self.schedule(delay, None, signal)
    }

    fn notifier(&self, signal: RoundSignal) -> Notifier {
        let inner = Arc::clone(&self.inner);
        Box::new(move || {
            if let Ok(mut clock) = inner.lock() {
                clock.notified.push(signal);
            }
        })
    }
}
