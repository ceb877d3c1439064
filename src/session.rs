//! Session controller.
//!
//! Owns the control signals, runs the engine on a dedicated worker thread and
//! streams [`SessionEvent`]s back to the host. The worker is the only writer
//! of session state; the host reads a [`SessionStatus`] snapshot and writes
//! the stop/pause signals.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::clipboard::clear_clipboard;
use crate::config::TyperConfig;
use crate::control::{sleep_interruptible, ControlSignals};
use crate::engine::KeystrokeEngine;
use crate::error::{Result, TyperError};
use crate::focus::FocusProbe;
use crate::injector::Injector;
use crate::model::{EngineState, FailedChar, Observation, SessionReport};
use crate::textfile::scrub_text;
use crate::timing::estimate_total;

const JOIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub countdown: Duration,
    pub focus_patterns: Vec<String>,
    pub focus_check_interval: usize,
    pub focus_recheck: Duration,
    pub shutdown_timeout: Duration,
    pub clear_clipboard: bool,
    pub seed: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&TyperConfig::default())
    }
}

impl From<&TyperConfig> for SessionSettings {
    fn from(config: &TyperConfig) -> Self {
        Self {
            countdown: Duration::from_secs(config.countdown_secs),
            focus_patterns: config.focus_patterns.clone(),
            focus_check_interval: config.focus_check_interval.max(1),
            focus_recheck: Duration::from_millis(config.focus_recheck_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
            clear_clipboard: config.clear_clipboard,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Countdown { remaining: u64 },
    Started { total_chars: usize, estimate: Duration },
    Observation(Observation),
    FocusLost { position: usize },
    FocusRestored,
    Finished(SessionReport),
    Aborted { error: String, report: SessionReport },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: EngineState,
    pub processed: usize,
    pub total_chars: usize,
    pub failed: usize,
    pub focus_lost: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            processed: 0,
            total_chars: 0,
            failed: 0,
            focus_lost: false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct SessionController<I, F> {
    injector: Arc<Mutex<I>>,
    focus: Arc<Mutex<F>>,
    settings: SessionSettings,
    signals: Arc<ControlSignals>,
    status: Arc<Mutex<SessionStatus>>,
    worker: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl<I, F> SessionController<I, F>
where
    I: Injector + Send + 'static,
    F: FocusProbe + Send + 'static,
{
    pub fn new(injector: I, focus: F, settings: SessionSettings) -> Self {
        Self {
            injector: Arc::new(Mutex::new(injector)),
            focus: Arc::new(Mutex::new(focus)),
            settings,
            signals: Arc::new(ControlSignals::new()),
            status: Arc::new(Mutex::new(SessionStatus::default())),
            worker: None,
            shut_down: false,
        }
    }

    /// Signals of the current (or most recent) session. Each `start` creates
    /// a fresh set, so take this after starting.
    pub fn signals(&self) -> Arc<ControlSignals> {
        self.signals.clone()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start typing `text` on a worker thread.
    ///
    /// Returns the session's event stream, or `None` (doing nothing) if a
    /// session is already active. The stream disconnects when the worker ends.
    pub fn start(&mut self, text: &str, speed: u32) -> Result<Option<Receiver<SessionEvent>>> {
        if self.is_active() {
            debug!("start ignored: a session is already active");
            return Ok(None);
        }
        if text.trim().is_empty() {
            return Err(TyperError::EmptyText);
        }

        if let Some(finished) = self.worker.take() {
            if finished.join().is_err() {
                error!("previous worker thread panicked");
            }
        }

        // Fresh signals per session; an earlier session's stop stays set.
        self.signals = Arc::new(ControlSignals::new());
        *lock(&self.status) = SessionStatus {
            total_chars: text.chars().count(),
            ..Default::default()
        };

        let (tx, rx) = mpsc::channel();
        let worker = Worker {
            injector: self.injector.clone(),
            focus: self.focus.clone(),
            signals: self.signals.clone(),
            status: self.status.clone(),
            settings: self.settings.clone(),
            text: text.to_string(),
            speed,
            failed: RefCell::new(Vec::new()),
            tx,
        };

        let handle = thread::Builder::new()
            .name("keycadence-worker".to_string())
            .spawn(move || worker.run())?;
        self.worker = Some(handle);
        self.shut_down = false;

        Ok(Some(rx))
    }

    pub fn pause(&self) {
        if self.is_active() {
            self.signals.set_paused(true);
            info!("typing paused");
        }
    }

    pub fn resume(&self) {
        if self.is_active() {
            self.signals.set_paused(false);
            info!("typing resumed");
        }
    }

    /// Returns the new pause state; false if no session is active.
    pub fn toggle_pause(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        let paused = self.signals.toggle_pause();
        info!(paused, "pause toggled");
        paused
    }

    pub fn stop(&self) {
        if !self.signals.is_stop_requested() {
            info!("stop requested");
        }
        self.signals.request_stop();
    }

    pub fn status(&self) -> SessionStatus {
        let mut status = lock(&self.status).clone();
        if status.state == EngineState::Running && self.signals.is_paused() {
            status.state = EngineState::Paused;
        }
        status
    }

    /// Stop any active session, wait a bounded time for the worker, and clear
    /// the clipboard. Returns false if the worker is still running; it stays
    /// tracked and `start` is refused until it exits.
    pub fn shutdown(&mut self) -> bool {
        self.shut_down = true;
        self.signals.request_stop();

        let exited = self.wait_for_worker();

        if self.settings.clear_clipboard {
            clear_clipboard();
        }
        exited
    }
}

impl<I, F> Drop for SessionController<I, F> {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        self.signals.request_stop();
        self.wait_for_worker();
        if self.settings.clear_clipboard {
            clear_clipboard();
        }
    }
}

impl<I, F> SessionController<I, F> {
    /// Wait up to `shutdown_timeout` for the worker. The handle is only
    /// released once the thread has exited.
    fn wait_for_worker(&mut self) -> bool {
        let Some(handle) = self.worker.as_ref() else {
            return true;
        };

        let timeout = self.settings.shutdown_timeout;
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(?timeout, "worker did not exit in time; continuing without it");
                return false;
            }
            thread::sleep(JOIN_POLL);
        }

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        true
    }
}

struct Worker<I, F> {
    injector: Arc<Mutex<I>>,
    focus: Arc<Mutex<F>>,
    signals: Arc<ControlSignals>,
    status: Arc<Mutex<SessionStatus>>,
    settings: SessionSettings,
    text: String,
    speed: u32,
    // Mirrors the engine's failed list so an abort can still report it.
    failed: RefCell<Vec<FailedChar>>,
    tx: Sender<SessionEvent>,
}

impl<I: Injector, F: FocusProbe> Worker<I, F> {
    fn run(mut self) {
        let text = std::mem::take(&mut self.text);
        let total_chars = text.chars().count();
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.type_session(text)));

        if let Err(payload) = outcome {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("typing session aborted: {message}");

            let status = self.update_status(|status| status.state = EngineState::Stopped);
            let report = SessionReport {
                state: EngineState::Stopped,
                total_chars,
                processed: status.processed,
                failed: self.failed.take(),
                elapsed_ms: started.elapsed().as_millis().try_into().unwrap_or(u64::MAX),
                error: Some(message.clone()),
            };
            self.send(SessionEvent::Aborted {
                error: message,
                report,
            });
        }
        self.signals.set_focus_paused(false);
    }

    fn type_session(&self, text: String) {
        let total_chars = text.chars().count();

        if !self.countdown() {
            scrub_text(text);
            info!("typing stopped during countdown");
            self.update_status(|status| status.state = EngineState::Stopped);
            self.send(SessionEvent::Finished(SessionReport {
                state: EngineState::Stopped,
                total_chars,
                processed: 0,
                failed: Vec::new(),
                elapsed_ms: 0,
                error: None,
            }));
            return;
        }

        let mut injector = lock(&self.injector);
        let mut focus = lock(&self.focus);

        let estimate = Duration::try_from_secs_f64(estimate_total(&text, self.speed))
            .unwrap_or_default();
        self.send(SessionEvent::Started {
            total_chars,
            estimate,
        });
        self.update_status(|status| status.state = EngineState::Running);

        let engine = match self.settings.seed {
            Some(seed) => KeystrokeEngine::with_seed(seed),
            None => KeystrokeEngine::new(),
        };
        let mut run = engine.type_text(&text, self.speed, &self.signals, &mut *injector);
        scrub_text(text);

        let interval = self.settings.focus_check_interval.max(1);
        while let Some(item) = run.next() {
            match item {
                Ok(observation) => {
                    if !observation.success {
                        self.failed.borrow_mut().push(FailedChar {
                            position: observation.position,
                            ch: observation.ch,
                        });
                    }
                    let processed = run.processed();
                    let failed = run.failed().len();
                    self.update_status(|status| {
                        status.processed = processed;
                        status.failed = failed;
                    });
                    self.send(SessionEvent::Observation(observation));

                    if processed % interval == 0 && processed < total_chars {
                        self.hold_until_focused(&mut *focus, observation.position);
                    }
                }
                Err(err) => {
                    let report = run.report();
                    self.update_status(|status| status.state = report.state);
                    self.send(SessionEvent::Aborted {
                        error: err.to_string(),
                        report,
                    });
                    return;
                }
            }
        }

        let report = run.into_report();
        self.update_status(|status| {
            status.state = report.state;
            status.processed = report.processed;
            status.failed = report.failed.len();
        });
        self.send(SessionEvent::Finished(report));
    }

    /// Count down one second at a time. Returns false if stopped.
    fn countdown(&self) -> bool {
        let secs = self.settings.countdown.as_secs();
        for remaining in (1..=secs).rev() {
            if self.signals.is_stop_requested() {
                return false;
            }
            self.send(SessionEvent::Countdown { remaining });
            sleep_interruptible(&self.signals, Duration::from_secs(1));
        }
        let rest = self.settings.countdown - Duration::from_secs(secs);
        sleep_interruptible(&self.signals, rest);
        !self.signals.is_stop_requested()
    }

    /// Auto-pause while the target lacks focus; resume once it returns or
    /// stop is requested.
    fn hold_until_focused(&self, focus: &mut F, position: usize) {
        let patterns = &self.settings.focus_patterns;
        if focus.is_target_focused(patterns) {
            return;
        }

        warn!(position, "target window lost focus; pausing");
        self.signals.set_focus_paused(true);
        self.update_status(|status| status.focus_lost = true);
        self.send(SessionEvent::FocusLost { position });

        while sleep_interruptible(&self.signals, self.settings.focus_recheck) {
            if focus.is_target_focused(patterns) {
                info!("target window focused again; resuming");
                self.send(SessionEvent::FocusRestored);
                break;
            }
        }

        self.signals.set_focus_paused(false);
        self.update_status(|status| status.focus_lost = false);
    }

    fn update_status(&self, f: impl FnOnce(&mut SessionStatus)) -> SessionStatus {
        let mut status = lock(&self.status);
        f(&mut status);
        status.clone()
    }

    fn send(&self, event: SessionEvent) {
        // The host may have stopped listening; the session still runs to its end.
        let _ = self.tx.send(event);
    }
}
