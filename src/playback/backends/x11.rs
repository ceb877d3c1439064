use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, AtomEnum, ConnectionExt as _, GetInputFocusReply};
use x11rb::protocol::xtest::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

use crate::focus::{title_matches, FocusProbe};
use crate::injector::KeyBackend;
use crate::keyboard::{
    char_for_keystroke, char_to_keystroke, keystroke_for_token, modifier_keycode, KeyStroke,
    KEY_LEFTSHIFT,
};
use crate::playback::backends::COMMON_MODIFIER_KEYCODES;

// X11 special focus value: the focused window follows the pointer.
const POINTER_ROOT: xproto::Window = 1;
// Window managers reparent clients into frames; the title may sit a few levels up.
const MAX_PARENT_WALK: usize = 8;
const TITLE_MAX_LEN: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Pressed,
    Released,
}

fn evdev_to_x11_keycode(evdev_keycode: u32) -> Result<u8> {
    // On most Linux Xorg setups, X11 keycodes are evdev + 8.
    let x11 = evdev_keycode
        .checked_add(8)
        .ok_or_else(|| anyhow!("evdev keycode overflow"))?;
    u8::try_from(x11).map_err(|_| anyhow!("evdev keycode {evdev_keycode} out of range for X11"))
}

fn key_state_to_x11_event_type(state: KeyState) -> u8 {
    match state {
        KeyState::Pressed => xproto::KEY_PRESS_EVENT,
        KeyState::Released => xproto::KEY_RELEASE_EVENT,
    }
}

fn query_xtest(conn: &impl Connection) -> Result<()> {
    let ext = conn
        .extension_information(xtest::X11_EXTENSION_NAME)
        .context("failed to query X11 extension info")?;

    if ext.is_none() {
        return Err(anyhow!(
            "X11 backend requires the XTEST extension (not present on this X server)"
        ));
    }

    let version = conn
        .xtest_get_version(2, 2)
        .ok()
        .and_then(|cookie| cookie.reply().ok());
    if let Some(version) = version {
        debug!(
            major = version.major_version,
            minor = version.minor_version,
            "XTEST available"
        );
    }

    Ok(())
}

fn get_focus(conn: &impl Connection) -> Result<GetInputFocusReply> {
    conn.get_input_focus()
        .context("failed to request input focus")?
        .reply()
        .context("failed to read input focus reply")
}

fn keysyms_for_keycode(conn: &impl Connection, keycode: u8) -> Result<(xproto::Keysym, xproto::Keysym)> {
    let reply = conn
        .get_keyboard_mapping(keycode, 1)
        .context("failed to request keyboard mapping")?
        .reply()
        .context("failed to read keyboard mapping")?;

    if reply.keysyms_per_keycode == 0 {
        return Err(anyhow!("X server returned 0 keysyms per keycode"));
    }

    let at = |index: usize| reply.keysyms.get(index).copied().unwrap_or(x11rb::NO_SYMBOL);
    Ok((at(0), at(1)))
}

fn validate_us_keymap(conn: &impl Connection) -> Result<()> {
    // Latin-1 keysyms equal their character code. Each probe checks the
    // unshifted and shifted symbol of one representative key.
    let probes = ['a', 'q', '1', '-', '\'', '[', '`'];

    for plain in probes {
        let stroke = char_to_keystroke(plain)
            .ok_or_else(|| anyhow!("no keystroke for probe {plain:?}"))?;
        let shifted = char_for_keystroke(KeyStroke {
            shift: true,
            ..stroke
        })
        .ok_or_else(|| anyhow!("no shifted symbol for {plain:?}"))?;

        let keycode = evdev_to_x11_keycode(stroke.keycode)?;
        let (got0, got1) = keysyms_for_keycode(conn, keycode)?;

        if got0 == x11rb::NO_SYMBOL || got1 == x11rb::NO_SYMBOL {
            return Err(anyhow!(
                "X11 backend could not validate the X server keymap: keycode {keycode} returned NoSymbol ({got0:#x}/{got1:#x}). This backend assumes X11 keycodes are evdev+8 and requires a US keymap."
            ));
        }
        if got0 != plain as u32 || got1 != shifted as u32 {
            return Err(anyhow!(
                "X11 backend requires a US keyboard layout, but the X server keymap does not match (keycode {keycode}: got {got0:#x}/{got1:#x}). Try `setxkbmap us`."
            ));
        }
    }

    Ok(())
}

fn xtest_key(
    conn: &impl Connection,
    root: xproto::Window,
    keycode: u8,
    state: KeyState,
) -> Result<()> {
    let type_ = key_state_to_x11_event_type(state);
    conn.xtest_fake_input(type_, keycode, x11rb::CURRENT_TIME, root, 0, 0, 0)
        .context("failed to send XTEST fake input")?;
    Ok(())
}

fn reset_common_modifiers_best_effort(conn: &impl Connection, root: xproto::Window) {
    for keycode in COMMON_MODIFIER_KEYCODES {
        if let Ok(code) = evdev_to_x11_keycode(keycode) {
            let _ = xtest_key(conn, root, code, KeyState::Released);
        }
    }
    let _ = conn.flush();
}

/// Keystroke injection through the XTEST extension.
pub struct X11Backend {
    conn: RustConnection,
    root: xproto::Window,
}

impl X11Backend {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("failed to connect to X11")?;
        query_xtest(&conn)?;
        validate_us_keymap(&conn)?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| anyhow!("invalid X11 screen index"))?;

        // X11 has no per-client modifier state; start from a neutral keyboard.
        reset_common_modifiers_best_effort(&conn, root);

        Ok(Self { conn, root })
    }

    fn key(&self, evdev_keycode: u32, state: KeyState) -> Result<()> {
        xtest_key(&self.conn, self.root, evdev_to_x11_keycode(evdev_keycode)?, state)
    }

    /// Press and release `keycode` while holding `held` (outermost first).
    fn chord(&self, held: &[u32], keycode: u32) -> Result<()> {
        let mut pressed = Vec::with_capacity(held.len());
        let mut result = Ok(());
        for &modifier in held {
            result = self.key(modifier, KeyState::Pressed);
            if result.is_err() {
                break;
            }
            pressed.push(modifier);
        }

        if result.is_ok() {
            result = self
                .key(keycode, KeyState::Pressed)
                .and_then(|()| self.key(keycode, KeyState::Released));
        }

        // Release whatever was pressed even if the tap itself failed.
        for &modifier in pressed.iter().rev() {
            let released = self.key(modifier, KeyState::Released);
            if result.is_ok() {
                result = released;
            }
        }

        self.conn.flush().context("failed to flush X11 connection")?;
        result
    }

    fn stroke(&self, stroke: KeyStroke, extra_modifier: Option<u32>) -> Result<()> {
        let mut held = Vec::with_capacity(2);
        held.extend(extra_modifier);
        if stroke.shift && extra_modifier != Some(KEY_LEFTSHIFT) {
            held.push(KEY_LEFTSHIFT);
        }
        self.chord(&held, stroke.keycode)
    }
}

impl KeyBackend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn tap(&mut self, key: &str) -> Result<()> {
        let stroke = keystroke_for_token(key)?;
        self.stroke(stroke, None)
    }

    fn tap_combo(&mut self, modifier: &str, key: &str) -> Result<()> {
        let modifier = modifier_keycode(modifier)?;
        let stroke = keystroke_for_token(key)?;
        self.stroke(stroke, Some(modifier))
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        reset_common_modifiers_best_effort(&self.conn, self.root);
    }
}

/// Reads the focused window's title via EWMH `_NET_WM_NAME`, falling back to
/// `WM_NAME`.
pub struct X11FocusProbe {
    conn: RustConnection,
    net_wm_name: xproto::Atom,
    utf8_string: xproto::Atom,
}

impl X11FocusProbe {
    pub fn connect() -> Result<Self> {
        let (conn, _) = x11rb::connect(None).context("failed to connect to X11")?;
        let net_wm_name = intern(&conn, b"_NET_WM_NAME")?;
        let utf8_string = intern(&conn, b"UTF8_STRING")?;
        Ok(Self {
            conn,
            net_wm_name,
            utf8_string,
        })
    }

    pub fn focused_title(&self) -> Result<Option<String>> {
        let mut window = get_focus(&self.conn)?.focus;

        for _ in 0..MAX_PARENT_WALK {
            if window == x11rb::NONE || window == POINTER_ROOT {
                return Ok(None);
            }
            if let Some(title) = self.window_title(window)? {
                return Ok(Some(title));
            }

            let tree = self
                .conn
                .query_tree(window)
                .context("failed to request window tree")?
                .reply()
                .context("failed to read window tree")?;
            if tree.parent == x11rb::NONE || window == tree.root {
                return Ok(None);
            }
            window = tree.parent;
        }

        Ok(None)
    }

    fn window_title(&self, window: xproto::Window) -> Result<Option<String>> {
        let lookups = [
            (self.net_wm_name, self.utf8_string),
            (AtomEnum::WM_NAME.into(), AtomEnum::ANY.into()),
        ];

        for (property, type_) in lookups {
            let reply = self
                .conn
                .get_property(false, window, property, type_, 0, TITLE_MAX_LEN)
                .context("failed to request window title")?
                .reply()
                .context("failed to read window title")?;
            if !reply.value.is_empty() {
                return Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()));
            }
        }

        Ok(None)
    }
}

fn intern(conn: &impl Connection, name: &[u8]) -> Result<xproto::Atom> {
    Ok(conn
        .intern_atom(false, name)
        .context("failed to intern X11 atom")?
        .reply()
        .context("failed to read X11 atom")?
        .atom)
}

impl FocusProbe for X11FocusProbe {
    fn is_target_focused(&mut self, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return true;
        }
        match self.focused_title() {
            Ok(Some(title)) => {
                let focused = title_matches(&title, patterns);
                debug!(focused, "focus check");
                focused
            }
            Ok(None) => false,
            Err(err) => {
                // An unreadable title must not wedge the session in a pause.
                warn!("focus check failed, assuming focused: {err:#}");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evdev_codes_shift_by_eight() {
        assert_eq!(evdev_to_x11_keycode(crate::keyboard::KEY_A).unwrap(), 38);
        assert_eq!(evdev_to_x11_keycode(crate::keyboard::KEY_ESC).unwrap(), 9);
        assert!(evdev_to_x11_keycode(250).is_err());
        assert!(evdev_to_x11_keycode(u32::MAX).is_err());
    }
}
