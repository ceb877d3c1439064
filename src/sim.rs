use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::charset::SHIFT;
use crate::injector::Injector;
use crate::keyboard::{char_for_keystroke, keystroke_for_token, KeyStroke};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Press {
    Key(String),
    Combo { modifier: String, key: String },
}

/// Injector that records every press instead of touching the OS.
///
/// The log is shared, so it stays readable after the injector has been moved
/// into a session controller. Selected calls (0-based) can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingInjector {
    log: Arc<Mutex<Vec<Press>>>,
    failing_calls: HashSet<usize>,
    calls: usize,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            failing_calls: calls.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<Press>>> {
        self.log.clone()
    }

    pub fn presses(&self) -> Vec<Press> {
        snapshot(&self.log)
    }

    fn record(&mut self, press: Press) -> bool {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(press);
        let call = self.calls;
        self.calls += 1;
        !self.failing_calls.contains(&call)
    }
}

impl Injector for RecordingInjector {
    fn press(&mut self, key: &str) -> bool {
        self.record(Press::Key(key.to_string()))
    }

    fn press_combo(&mut self, modifier: &str, key: &str) -> bool {
        self.record(Press::Combo {
            modifier: modifier.to_string(),
            key: key.to_string(),
        })
    }
}

pub fn snapshot(log: &Mutex<Vec<Press>>) -> Vec<Press> {
    log.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Simulate the text a US-QWERTY target receives from a sequence of presses.
///
/// This is intended for tests/debugging. Only Shift combinations are
/// understood.
pub fn simulate_typed_text(presses: &[Press]) -> Result<String> {
    let mut out = String::new();

    for press in presses {
        let stroke = match press {
            Press::Key(key) => keystroke_for_token(key)?,
            Press::Combo { modifier, key } => {
                if !modifier.eq_ignore_ascii_case(SHIFT) {
                    return Err(anyhow!(
                        "simulate_typed_text does not support {modifier}+{key}"
                    ));
                }
                KeyStroke {
                    shift: true,
                    ..keystroke_for_token(key)?
                }
            }
        };

        let c = char_for_keystroke(stroke).ok_or_else(|| {
            anyhow!(
                "simulate_typed_text does not support keycode {} (shift={})",
                stroke.keycode,
                stroke.shift
            )
        })?;
        out.push(c);
    }

    Ok(out)
}
