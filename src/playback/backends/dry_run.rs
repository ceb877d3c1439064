use anyhow::Result;
use tracing::debug;

use crate::injector::KeyBackend;
use crate::keyboard::{keystroke_for_token, modifier_keycode};

/// Backend that resolves every key against the US layout but sends nothing.
#[derive(Debug, Default)]
pub struct DryRunBackend {
    taps: usize,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn taps(&self) -> usize {
        self.taps
    }
}

impl KeyBackend for DryRunBackend {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn tap(&mut self, key: &str) -> Result<()> {
        let stroke = keystroke_for_token(key)?;
        self.taps += 1;
        debug!(keycode = stroke.keycode, shift = stroke.shift, "dry-run tap");
        Ok(())
    }

    fn tap_combo(&mut self, modifier: &str, key: &str) -> Result<()> {
        let modifier = modifier_keycode(modifier)?;
        let stroke = keystroke_for_token(key)?;
        self.taps += 1;
        debug!(modifier, keycode = stroke.keycode, "dry-run combo");
        Ok(())
    }
}
