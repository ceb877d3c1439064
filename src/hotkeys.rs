//! System-wide pause and stop hotkeys.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use tracing::{info, warn};

use crate::control::ControlSignals;

const EVENT_POLL: Duration = Duration::from_millis(10);

/// Registered hotkeys plus the thread that turns presses into control signals.
/// Unregisters on drop.
pub struct HotkeyListener {
    manager: GlobalHotKeyManager,
    hotkeys: Vec<HotKey>,
    done: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    pub fn start(pause: &str, stop: &str, signals: Arc<ControlSignals>) -> Result<Self> {
        let pause_key = parse_hotkey(pause)?;
        let stop_key = parse_hotkey(stop)?;
        if pause_key == stop_key {
            return Err(anyhow!("pause and stop hotkeys must differ ('{pause}')"));
        }

        let manager = GlobalHotKeyManager::new()
            .map_err(|e| anyhow!("failed to create hotkey manager: {e}"))?;
        for (hotkey, name) in [(pause_key, pause), (stop_key, stop)] {
            manager
                .register(hotkey)
                .map_err(|e| anyhow!("failed to register hotkey '{name}': {e}"))?;
        }
        info!(pause, stop, "global hotkeys registered");

        let done = Arc::new(AtomicBool::new(false));
        let thread = {
            let done = done.clone();
            let (pause_id, stop_id) = (pause_key.id(), stop_key.id());
            thread::Builder::new()
                .name("keycadence-hotkeys".to_string())
                .spawn(move || {
                    let receiver = GlobalHotKeyEvent::receiver();
                    while !done.load(Ordering::SeqCst) {
                        while let Ok(event) = receiver.try_recv() {
                            if event.state != HotKeyState::Pressed {
                                continue;
                            }
                            if event.id == stop_id {
                                info!("stop hotkey pressed");
                                signals.request_stop();
                            } else if event.id == pause_id {
                                let paused = signals.toggle_pause();
                                info!(paused, "pause hotkey pressed");
                            }
                        }
                        thread::sleep(EVENT_POLL);
                    }
                })
                .context("failed to spawn hotkey thread")?
        };

        Ok(Self {
            manager,
            hotkeys: vec![pause_key, stop_key],
            done,
            thread: Some(thread),
        })
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Err(e) = self.manager.unregister_all(&self.hotkeys) {
            warn!("failed to unregister hotkeys: {e}");
        }
    }
}

/// Parse `"ctrl+shift+f10"` style bindings.
pub fn parse_hotkey(binding: &str) -> Result<HotKey> {
    let lowered = binding.to_lowercase();
    let mut modifiers = Modifiers::empty();
    let mut code = None;

    for part in lowered.split('+').map(str::trim) {
        match part {
            "ctrl" | "control" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "meta" | "super" => modifiers |= Modifiers::SUPER,
            "" => return Err(anyhow!("empty key in hotkey '{binding}'")),
            key => {
                if code.is_some() {
                    return Err(anyhow!("multiple keys in hotkey '{binding}'"));
                }
                code = Some(parse_key_code(key)?);
            }
        }
    }

    let code = code.ok_or_else(|| anyhow!("no key in hotkey '{binding}'"))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, code))
}

fn parse_key_code(key: &str) -> Result<Code> {
    const LETTERS: [Code; 26] = [
        Code::KeyA, Code::KeyB, Code::KeyC, Code::KeyD, Code::KeyE, Code::KeyF, Code::KeyG,
        Code::KeyH, Code::KeyI, Code::KeyJ, Code::KeyK, Code::KeyL, Code::KeyM, Code::KeyN,
        Code::KeyO, Code::KeyP, Code::KeyQ, Code::KeyR, Code::KeyS, Code::KeyT, Code::KeyU,
        Code::KeyV, Code::KeyW, Code::KeyX, Code::KeyY, Code::KeyZ,
    ];
    const FUNCTION: [Code; 12] = [
        Code::F1, Code::F2, Code::F3, Code::F4, Code::F5, Code::F6, Code::F7, Code::F8,
        Code::F9, Code::F10, Code::F11, Code::F12,
    ];

    if let [b] = key.as_bytes() {
        if b.is_ascii_lowercase() {
            return Ok(LETTERS[(b - b'a') as usize]);
        }
    }
    if let Some(n) = key.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        if (1..=FUNCTION.len()).contains(&n) {
            return Ok(FUNCTION[n - 1]);
        }
    }

    let code = match key {
        "escape" | "esc" => Code::Escape,
        "pause" => Code::Pause,
        "space" => Code::Space,
        "enter" | "return" => Code::Enter,
        "tab" => Code::Tab,
        "backspace" => Code::Backspace,
        "delete" => Code::Delete,
        "insert" => Code::Insert,
        "home" => Code::Home,
        "end" => Code::End,
        "pageup" => Code::PageUp,
        "pagedown" => Code::PageDown,
        "scrolllock" => Code::ScrollLock,
        _ => return Err(anyhow!("unsupported hotkey key '{key}'")),
    };
    Ok(code)
}
