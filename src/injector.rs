//! Injection adapter.
//!
//! Two layers: a [`KeyBackend`] performs one raw key tap and reports errors;
//! [`RetryingInjector`] wraps it with a bounded retry loop and exposes the
//! boolean [`Injector`] contract the engine drives. The engine never retries
//! on its own.

use std::time::Duration;

use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// What the engine needs from the injection layer.
///
/// Implementations retry internally and return false only once every attempt
/// has failed. They must not panic on transient failures.
pub trait Injector {
    fn press(&mut self, key: &str) -> bool;
    fn press_combo(&mut self, modifier: &str, key: &str) -> bool;
}

impl<T: Injector + ?Sized> Injector for Box<T> {
    fn press(&mut self, key: &str) -> bool {
        (**self).press(key)
    }

    fn press_combo(&mut self, modifier: &str, key: &str) -> bool {
        (**self).press_combo(modifier, key)
    }
}

impl<T: Injector + ?Sized> Injector for &mut T {
    fn press(&mut self, key: &str) -> bool {
        (**self).press(key)
    }

    fn press_combo(&mut self, modifier: &str, key: &str) -> bool {
        (**self).press_combo(modifier, key)
    }
}

/// A single-attempt key tap against the operating system (or a stand-in).
pub trait KeyBackend {
    fn name(&self) -> &'static str;
    fn tap(&mut self, key: &str) -> anyhow::Result<()>;
    fn tap_combo(&mut self, modifier: &str, key: &str) -> anyhow::Result<()>;
}

impl<T: KeyBackend + ?Sized> KeyBackend for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn tap(&mut self, key: &str) -> anyhow::Result<()> {
        (**self).tap(key)
    }

    fn tap_combo(&mut self, modifier: &str, key: &str) -> anyhow::Result<()> {
        (**self).tap_combo(modifier, key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug)]
pub struct RetryingInjector<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: KeyBackend> RetryingInjector<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn attempt<F>(&mut self, what: &str, mut op: F) -> bool
    where
        F: FnMut(&mut B) -> anyhow::Result<()>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match op(&mut self.backend) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(attempt, "{what} succeeded after retry");
                    }
                    return true;
                }
                Err(err) => {
                    warn!(
                        backend = self.backend.name(),
                        attempt,
                        max_attempts,
                        "keystroke injection failed: {err:#}"
                    );
                    debug!("failed keystroke: {what}");
                    if attempt < max_attempts {
                        std::thread::sleep(self.policy.backoff);
                    }
                }
            }
        }
        false
    }
}

impl<B: KeyBackend> Injector for RetryingInjector<B> {
    fn press(&mut self, key: &str) -> bool {
        self.attempt(&format!("press {key:?}"), |backend| backend.tap(key))
    }

    fn press_combo(&mut self, modifier: &str, key: &str) -> bool {
        self.attempt(&format!("press {modifier}+{key:?}"), |backend| {
            backend.tap_combo(modifier, key)
        })
    }
}
