//! Stop/pause signals shared between the control context and the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Poll interval of the pause wait loop.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Longest single sleep between stop checks.
const SLEEP_STEP: Duration = Duration::from_millis(50);

/// Stop is one-way for a session; pause is toggled freely. A focus-loss pause
/// is tracked separately so clearing it never clears an operator pause.
#[derive(Debug, Default)]
pub struct ControlSignals {
    stop: AtomicBool,
    pause: AtomicBool,
    focus_pause: AtomicBool,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::SeqCst);
    }

    /// Flip the operator pause flag and return the new value.
    pub fn toggle_pause(&self) -> bool {
        !self.pause.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_operator_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn set_focus_paused(&self, paused: bool) {
        self.focus_pause.store(paused, Ordering::SeqCst);
    }

    pub fn is_focus_paused(&self) -> bool {
        self.focus_pause.load(Ordering::SeqCst)
    }

    /// True while either the operator or a focus loss holds the run.
    pub fn is_paused(&self) -> bool {
        self.is_operator_paused() || self.is_focus_paused()
    }
}

/// Sleep for `duration` unless stop is requested first.
///
/// Returns false if the sleep was cut short by stop.
pub fn sleep_interruptible(signals: &ControlSignals, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if signals.is_stop_requested() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SLEEP_STEP));
    }
}

/// Block while paused, polling at [`PAUSE_POLL`]. Returns how long it waited.
pub fn wait_while_paused(signals: &ControlSignals) -> Duration {
    let start = Instant::now();
    while signals.is_paused() && !signals.is_stop_requested() {
        std::thread::sleep(PAUSE_POLL);
    }
    start.elapsed()
}
