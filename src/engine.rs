//! Keystroke engine.
//!
//! A run is a lazy iterator: each `next()` consumes exactly one character in
//! text order (resolve, inject, sleep) and yields one [`Observation`]. The
//! iterator ends when the text is exhausted (Completed) or when the stop
//! signal is observed (Stopped).
//!
//! ```no_run
//! use keycadence::control::ControlSignals;
//! use keycadence::engine::KeystrokeEngine;
//! use keycadence::sim::RecordingInjector;
//!
//! let signals = ControlSignals::new();
//! let mut injector = RecordingInjector::new();
//! let mut run = KeystrokeEngine::new().type_text("Hi!", 5, &signals, &mut injector);
//! for observation in run.by_ref() {
//!     let observation = observation?;
//!     println!("{:>3.0}% {:?}", observation.progress * 100.0, observation.ch);
//! }
//! let report = run.report();
//! # Ok::<(), keycadence::TyperError>(())
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::charset::{resolve_action, KeyAction};
use crate::control::{sleep_interruptible, wait_while_paused, ControlSignals};
use crate::error::TyperError;
use crate::injector::Injector;
use crate::model::{EngineState, FailedChar, Observation, SessionReport, TypingSession};
use crate::timing::{apply_variance_with, delay_for};

#[derive(Debug, Clone, Default)]
pub struct KeystrokeEngine {
    seed: Option<u64>,
}

impl KeystrokeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the variance RNG (for debugging).
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    pub fn type_text<'a, I: Injector + ?Sized>(
        &self,
        text: &str,
        speed: u32,
        signals: &'a ControlSignals,
        injector: &'a mut I,
    ) -> TypingRun<'a, I> {
        TypingRun {
            total: text.chars().count(),
            session: TypingSession::new(text, speed),
            signals,
            injector,
            rng: rng_from_seed(self.seed),
            state: EngineState::Idle,
            started: None,
            error: None,
        }
    }
}

fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

pub struct TypingRun<'a, I: ?Sized> {
    session: TypingSession,
    total: usize,
    signals: &'a ControlSignals,
    injector: &'a mut I,
    rng: StdRng,
    state: EngineState,
    started: Option<Instant>,
    error: Option<String>,
}

impl<'a, I: Injector + ?Sized> TypingRun<'a, I> {
    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn total_chars(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.session.processed()
    }

    pub fn failed(&self) -> &[FailedChar] {
        self.session.failed()
    }

    /// Snapshot of the run. A run abandoned before reaching a terminal state
    /// is reported as stopped.
    pub fn report(&self) -> SessionReport {
        let state = if self.state.is_terminal() {
            self.state
        } else {
            EngineState::Stopped
        };
        SessionReport {
            state,
            total_chars: self.total,
            processed: self.session.processed(),
            failed: self.session.failed().to_vec(),
            elapsed_ms: self
                .started
                .map(|t| t.elapsed().as_millis().try_into().unwrap_or(u64::MAX))
                .unwrap_or(0),
            error: self.error.clone(),
        }
    }

    /// Consume the run, moving the failed list out instead of copying it.
    pub fn into_report(mut self) -> SessionReport {
        let mut report = self.report();
        report.failed = self.session.take_failed();
        report
    }

    fn complete(&mut self) -> Option<<Self as Iterator>::Item> {
        self.state = EngineState::Completed;
        self.session.discard_text();
        info!(
            processed = self.session.processed(),
            failed = self.session.failed().len(),
            "typing completed"
        );
        None
    }

    fn halt(&mut self) -> Option<<Self as Iterator>::Item> {
        self.state = EngineState::Stopped;
        self.session.discard_text();
        info!(
            processed = self.session.processed(),
            remaining = self.total - self.session.processed(),
            "typing stopped"
        );
        None
    }

    fn abort(&mut self, message: String) -> TyperError {
        error!("typing aborted: {message}");
        self.state = EngineState::Stopped;
        self.session.discard_text();
        self.error = Some(message.clone());
        TyperError::fatal_session(message)
    }

    fn inject(&mut self, position: usize, ch: char) -> bool {
        let Some(action) = resolve_action(ch) else {
            warn!(position, "unsupported character not sent");
            return false;
        };

        let injector = &mut *self.injector;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &action {
            KeyAction::Key(key) => injector.press(key),
            KeyAction::Combo { modifier, key } => injector.press_combo(modifier, key),
        }));

        match outcome {
            Ok(true) => true,
            Ok(false) => {
                warn!(position, "character could not be typed");
                false
            }
            Err(payload) => {
                error!(
                    position,
                    "injector failed unexpectedly: {}",
                    panic_message(payload.as_ref())
                );
                false
            }
        }
    }
}

impl<'a, I: Injector + ?Sized> Iterator for TypingRun<'a, I> {
    type Item = Result<Observation, TyperError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.is_terminal() {
            return None;
        }

        if self.state == EngineState::Idle {
            self.started = Some(Instant::now());
            self.state = EngineState::Running;
            info!(
                total = self.total,
                speed = self.session.speed(),
                "typing started"
            );
        }

        let position = self.session.processed();
        if position >= self.total {
            return self.complete();
        }

        if self.signals.is_stop_requested() {
            return self.halt();
        }

        if self.signals.is_paused() {
            self.state = EngineState::Paused;
            debug!(position, "typing paused");
            let waited = wait_while_paused(self.signals);
            if self.signals.is_stop_requested() {
                return self.halt();
            }
            debug!(position, ?waited, "typing resumed");
            self.state = EngineState::Running;
        }

        let ch = match self.session.char_at(position) {
            Some(ch) => ch,
            None => {
                let message = format!("session text ended early at position {position}");
                return Some(Err(self.abort(message)));
            }
        };

        let seconds = apply_variance_with(delay_for(ch, self.session.speed()), &mut self.rng);
        let delay = match Duration::try_from_secs_f64(seconds) {
            Ok(delay) => delay,
            Err(err) => {
                let message = format!("invalid delay {seconds}s at position {position}: {err}");
                return Some(Err(self.abort(message)));
            }
        };

        let success = self.inject(position, ch);
        self.session.record(position, ch, success);
        debug!(position, ?ch, success, ?delay, "keystroke");

        sleep_interruptible(self.signals, delay);

        Some(Ok(Observation {
            progress: self.session.processed() as f64 / self.total as f64,
            position,
            ch,
            success,
        }))
    }
}
