use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl EngineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EngineState::Completed | EngineState::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Idle => "idle",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Completed => "completed",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A character that could not be injected after all attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedChar {
    pub position: usize,
    pub ch: char,
}

/// One event per consumed character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Characters processed so far divided by total characters.
    pub progress: f64,
    pub position: usize,
    pub ch: char,
    pub success: bool,
}

/// Outcome of a finished session. Never contains the typed text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub state: EngineState,
    pub total_chars: usize,
    pub processed: usize,
    pub failed: Vec<FailedChar>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionReport {
    pub fn typed(&self) -> usize {
        self.processed - self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.state == EngineState::Completed && self.failed.is_empty() && self.error.is_none()
    }
}

/// Mutable state of one run. Owned by the worker that drives the engine.
pub struct TypingSession {
    chars: Vec<char>,
    speed: u32,
    processed: usize,
    failed: Vec<FailedChar>,
}

impl TypingSession {
    pub fn new(text: &str, speed: u32) -> Self {
        Self {
            chars: text.chars().collect(),
            speed,
            processed: 0,
            failed: Vec::new(),
        }
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn total_chars(&self) -> usize {
        self.chars.len()
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        self.chars.get(position).copied()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Characters injected successfully.
    pub fn typed(&self) -> usize {
        self.processed - self.failed.len()
    }

    pub fn failed(&self) -> &[FailedChar] {
        &self.failed
    }

    pub(crate) fn record(&mut self, position: usize, ch: char, success: bool) {
        self.processed += 1;
        if !success {
            self.failed.push(FailedChar { position, ch });
        }
    }

    /// Overwrite and release the source text.
    pub fn discard_text(&mut self) {
        self.chars.fill('\0');
        self.chars = Vec::new();
    }

    pub(crate) fn take_failed(&mut self) -> Vec<FailedChar> {
        std::mem::take(&mut self.failed)
    }
}

impl Drop for TypingSession {
    fn drop(&mut self) {
        self.discard_text();
    }
}

impl fmt::Debug for TypingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingSession")
            .field("total_chars", &self.chars.len())
            .field("speed", &self.speed)
            .field("processed", &self.processed)
            .field("failed", &self.failed.len())
            .finish()
    }
}
