use crate::error::{Result, TyperError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: u32,
    pub shift: bool,
}

impl KeyStroke {
    const fn plain(keycode: u32) -> Self {
        Self {
            keycode,
            shift: false,
        }
    }

    const fn shifted(keycode: u32) -> Self {
        Self {
            keycode,
            shift: true,
        }
    }
}

// Linux evdev keycodes (see linux/input-event-codes.h)
pub const KEY_ESC: u32 = 1;

pub const KEY_1: u32 = 2;
pub const KEY_2: u32 = 3;
pub const KEY_3: u32 = 4;
pub const KEY_4: u32 = 5;
pub const KEY_5: u32 = 6;
pub const KEY_6: u32 = 7;
pub const KEY_7: u32 = 8;
pub const KEY_8: u32 = 9;
pub const KEY_9: u32 = 10;
pub const KEY_0: u32 = 11;

pub const KEY_MINUS: u32 = 12;
pub const KEY_EQUAL: u32 = 13;
pub const KEY_BACKSPACE: u32 = 14;
pub const KEY_TAB: u32 = 15;

pub const KEY_Q: u32 = 16;
pub const KEY_W: u32 = 17;
pub const KEY_E: u32 = 18;
pub const KEY_R: u32 = 19;
pub const KEY_T: u32 = 20;
pub const KEY_Y: u32 = 21;
pub const KEY_U: u32 = 22;
pub const KEY_I: u32 = 23;
pub const KEY_O: u32 = 24;
pub const KEY_P: u32 = 25;

pub const KEY_LEFTBRACE: u32 = 26;
pub const KEY_RIGHTBRACE: u32 = 27;
pub const KEY_ENTER: u32 = 28;

pub const KEY_LEFTCTRL: u32 = 29;

pub const KEY_A: u32 = 30;
pub const KEY_S: u32 = 31;
pub const KEY_D: u32 = 32;
pub const KEY_F: u32 = 33;
pub const KEY_G: u32 = 34;
pub const KEY_H: u32 = 35;
pub const KEY_J: u32 = 36;
pub const KEY_K: u32 = 37;
pub const KEY_L: u32 = 38;

pub const KEY_SEMICOLON: u32 = 39;
pub const KEY_APOSTROPHE: u32 = 40;
pub const KEY_GRAVE: u32 = 41;

pub const KEY_LEFTSHIFT: u32 = 42;

pub const KEY_BACKSLASH: u32 = 43;

pub const KEY_Z: u32 = 44;
pub const KEY_X: u32 = 45;
pub const KEY_C: u32 = 46;
pub const KEY_V: u32 = 47;
pub const KEY_B: u32 = 48;
pub const KEY_N: u32 = 49;
pub const KEY_M: u32 = 50;

pub const KEY_COMMA: u32 = 51;
pub const KEY_DOT: u32 = 52;
pub const KEY_SLASH: u32 = 53;

pub const KEY_RIGHTSHIFT: u32 = 54;

pub const KEY_LEFTALT: u32 = 56;
pub const KEY_SPACE: u32 = 57;

pub const KEY_RIGHTCTRL: u32 = 97;
pub const KEY_RIGHTALT: u32 = 100;

const LETTER_KEYCODES: [u32; 26] = [
    KEY_A, KEY_B, KEY_C, KEY_D, KEY_E, KEY_F, KEY_G, KEY_H, KEY_I, KEY_J, KEY_K, KEY_L, KEY_M,
    KEY_N, KEY_O, KEY_P, KEY_Q, KEY_R, KEY_S, KEY_T, KEY_U, KEY_V, KEY_W, KEY_X, KEY_Y, KEY_Z,
];

const DIGIT_KEYCODES: [u32; 10] = [
    KEY_0, KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8, KEY_9,
];

// (unshifted, shifted, keycode) for the non-alphanumeric keys of a US layout.
const SYMBOL_KEYS: [(char, char, u32); 11] = [
    ('-', '_', KEY_MINUS),
    ('=', '+', KEY_EQUAL),
    ('[', '{', KEY_LEFTBRACE),
    (']', '}', KEY_RIGHTBRACE),
    ('\\', '|', KEY_BACKSLASH),
    (';', ':', KEY_SEMICOLON),
    ('\'', '"', KEY_APOSTROPHE),
    ('`', '~', KEY_GRAVE),
    (',', '<', KEY_COMMA),
    ('.', '>', KEY_DOT),
    ('/', '?', KEY_SLASH),
];

const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

/// US-QWERTY keystroke for a single character.
pub fn char_to_keystroke(c: char) -> Option<KeyStroke> {
    if c.is_ascii_lowercase() {
        return Some(KeyStroke::plain(LETTER_KEYCODES[(c as u8 - b'a') as usize]));
    }
    if c.is_ascii_uppercase() {
        return Some(KeyStroke::shifted(
            LETTER_KEYCODES[(c as u8 - b'A') as usize],
        ));
    }
    if c.is_ascii_digit() {
        return Some(KeyStroke::plain(DIGIT_KEYCODES[(c as u8 - b'0') as usize]));
    }
    if let Some(digit) = SHIFTED_DIGITS.iter().position(|&s| s == c) {
        return Some(KeyStroke::shifted(DIGIT_KEYCODES[digit]));
    }

    let stroke = match c {
        ' ' => KeyStroke::plain(KEY_SPACE),
        '\n' => KeyStroke::plain(KEY_ENTER),
        '\t' => KeyStroke::plain(KEY_TAB),
        _ => {
            let (plain, _, keycode) = SYMBOL_KEYS
                .iter()
                .find(|(plain, shifted, _)| *plain == c || *shifted == c)?;
            if *plain == c {
                KeyStroke::plain(*keycode)
            } else {
                KeyStroke::shifted(*keycode)
            }
        }
    };
    Some(stroke)
}

/// Keystroke for a key token: a single character or a named key.
pub fn keystroke_for_token(token: &str) -> Result<KeyStroke> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return char_to_keystroke(c).ok_or_else(|| TyperError::unknown_key(token));
    }

    let keycode = match token.to_ascii_lowercase().as_str() {
        "enter" | "return" => KEY_ENTER,
        "tab" => KEY_TAB,
        "space" => KEY_SPACE,
        "backspace" => KEY_BACKSPACE,
        "escape" | "esc" => KEY_ESC,
        _ => return modifier_keycode(token).map(KeyStroke::plain),
    };
    Ok(KeyStroke::plain(keycode))
}

pub fn modifier_keycode(name: &str) -> Result<u32> {
    match name.to_ascii_lowercase().as_str() {
        "shift" => Ok(KEY_LEFTSHIFT),
        "ctrl" | "control" => Ok(KEY_LEFTCTRL),
        "alt" => Ok(KEY_LEFTALT),
        _ => Err(TyperError::unknown_key(name)),
    }
}

/// Reverse lookup used by the typed-text simulator.
pub fn char_for_keystroke(stroke: KeyStroke) -> Option<char> {
    (b' '..=b'~')
        .map(char::from)
        .chain(['\n', '\t'])
        .find(|&c| char_to_keystroke(c) == Some(stroke))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_digits_and_shifted_symbols() {
        assert_eq!(char_to_keystroke('a'), Some(KeyStroke::plain(KEY_A)));
        assert_eq!(char_to_keystroke('Z'), Some(KeyStroke::shifted(KEY_Z)));
        assert_eq!(char_to_keystroke('0'), Some(KeyStroke::plain(KEY_0)));
        assert_eq!(char_to_keystroke('!'), Some(KeyStroke::shifted(KEY_1)));
        assert_eq!(char_to_keystroke('('), Some(KeyStroke::shifted(KEY_9)));
        assert_eq!(char_to_keystroke('~'), Some(KeyStroke::shifted(KEY_GRAVE)));
        assert_eq!(char_to_keystroke('/'), Some(KeyStroke::plain(KEY_SLASH)));
        assert_eq!(char_to_keystroke('€'), None);
    }

    #[test]
    fn every_printable_ascii_char_has_a_keystroke() {
        for b in b' '..=b'~' {
            let c = char::from(b);
            let stroke = char_to_keystroke(c).expect("printable ASCII must be typable");
            assert_eq!(char_for_keystroke(stroke), Some(c));
        }
    }

    #[test]
    fn named_tokens() {
        assert_eq!(keystroke_for_token("enter").unwrap().keycode, KEY_ENTER);
        assert_eq!(keystroke_for_token("Tab").unwrap().keycode, KEY_TAB);
        assert_eq!(keystroke_for_token("space").unwrap().keycode, KEY_SPACE);
        assert_eq!(keystroke_for_token(" ").unwrap().keycode, KEY_SPACE);
        assert_eq!(keystroke_for_token("shift").unwrap().keycode, KEY_LEFTSHIFT);
        assert!(keystroke_for_token("hyper").is_err());
        assert!(keystroke_for_token("").is_err());
        assert!(keystroke_for_token("é").is_err());
    }

    #[test]
    fn modifiers() {
        assert_eq!(modifier_keycode("shift").unwrap(), KEY_LEFTSHIFT);
        assert_eq!(modifier_keycode("CTRL").unwrap(), KEY_LEFTCTRL);
        assert_eq!(modifier_keycode("alt").unwrap(), KEY_LEFTALT);
        assert!(modifier_keycode("super").is_err());
    }
}
