//! Session configuration.
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid. Command-line flags override file values.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, TyperError};
use crate::injector::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF};
use crate::timing::{is_valid_speed, DEFAULT_SPEED};

/// Upper bound for any single wait that must stay responsive to stop.
const MAX_UNINTERRUPTIBLE_MS: u64 = 1000;
const MAX_COUNTDOWN_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TyperConfig {
    pub speed: u32,
    pub countdown_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub focus_patterns: Vec<String>,
    /// Check focus after every this many characters.
    pub focus_check_interval: usize,
    pub focus_recheck_ms: u64,
    pub clear_clipboard: bool,
    pub shutdown_timeout_ms: u64,
    pub pause_hotkey: String,
    pub stop_hotkey: String,
}

impl Default for TyperConfig {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
            countdown_secs: 3,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
            focus_patterns: Vec::new(),
            focus_check_interval: 10,
            focus_recheck_ms: 500,
            clear_clipboard: true,
            shutdown_timeout_ms: 1000,
            pause_hotkey: "f10".to_string(),
            stop_hotkey: "escape".to_string(),
        }
    }
}

impl TyperConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| TyperError::config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(TyperError::config("max_attempts must be at least 1"));
        }
        if self.focus_check_interval == 0 {
            return Err(TyperError::config("focus_check_interval must be at least 1"));
        }
        if self.retry_backoff_ms > MAX_UNINTERRUPTIBLE_MS {
            return Err(TyperError::config(format!(
                "retry_backoff_ms must be <= {MAX_UNINTERRUPTIBLE_MS}"
            )));
        }
        // The retry loop does not watch stop; bound one keystroke's backoff total.
        let retry_wait = u64::from(self.max_attempts - 1).saturating_mul(self.retry_backoff_ms);
        if retry_wait > MAX_UNINTERRUPTIBLE_MS {
            return Err(TyperError::config(format!(
                "(max_attempts - 1) * retry_backoff_ms must be <= {MAX_UNINTERRUPTIBLE_MS} (got {retry_wait})"
            )));
        }
        if self.focus_recheck_ms > MAX_UNINTERRUPTIBLE_MS {
            return Err(TyperError::config(format!(
                "focus_recheck_ms must be <= {MAX_UNINTERRUPTIBLE_MS}"
            )));
        }
        if self.countdown_secs > MAX_COUNTDOWN_SECS {
            return Err(TyperError::config(format!(
                "countdown_secs must be <= {MAX_COUNTDOWN_SECS}"
            )));
        }
        if self.focus_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(TyperError::config("focus patterns must not be empty"));
        }
        if !is_valid_speed(self.speed) {
            warn!(
                speed = self.speed,
                "speed outside 1-10; using the default timing"
            );
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
