//! Character classification.
//!
//! Maps each character to a timing class and to the key press(es) needed to
//! produce it on a US-QWERTY layout.

use crate::error::{Result, TyperError};

/// How many offending characters an unsupported-text error carries.
pub const UNSUPPORTED_SAMPLE_LEN: usize = 5;

const EASY_CHARS: &str = "etaoinsrhldcu ";
const MEDIUM_CHARS: &str = "mfpgwybvkj";
const HARD_CHARS: &str = "xqz";
const PUNCTUATION_CHARS: &str = ".,;:'\"-!?";
const SPECIAL_CHARS: &str = "@#$%^&*()_+{}|:<>?~";

// Characters typed as Shift + base key.
const SHIFTED: [(char, &str); 21] = [
    ('!', "1"),
    ('@', "2"),
    ('#', "3"),
    ('$', "4"),
    ('%', "5"),
    ('^', "6"),
    ('&', "7"),
    ('*', "8"),
    ('(', "9"),
    (')', "0"),
    ('_', "-"),
    ('+', "="),
    ('{', "["),
    ('}', "]"),
    ('|', "\\"),
    (':', ";"),
    ('"', "'"),
    ('<', ","),
    ('>', "."),
    ('?', "/"),
    ('~', "`"),
];

pub const SHIFT: &str = "shift";
pub const ENTER: &str = "enter";
pub const TAB: &str = "tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    Easy,
    Medium,
    Hard,
    Punctuation,
    Special,
    Newline,
    Tab,
    Other,
}

impl CharClass {
    /// Multiplier applied to the base per-character delay.
    pub fn delay_factor(self) -> f64 {
        match self {
            CharClass::Easy => 0.9,
            CharClass::Medium => 1.0,
            CharClass::Hard => 1.2,
            CharClass::Punctuation => 1.1,
            CharClass::Special => 1.3,
            CharClass::Newline => 1.5,
            CharClass::Tab => 1.2,
            CharClass::Other => 1.0,
        }
    }
}

/// The key press needed to produce one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Key(String),
    Combo {
        modifier: &'static str,
        key: &'static str,
    },
}

pub fn classify(c: char) -> CharClass {
    if EASY_CHARS.contains(c) {
        CharClass::Easy
    } else if MEDIUM_CHARS.contains(c) {
        CharClass::Medium
    } else if HARD_CHARS.contains(c) {
        CharClass::Hard
    } else if PUNCTUATION_CHARS.contains(c) {
        CharClass::Punctuation
    } else if SPECIAL_CHARS.contains(c) {
        CharClass::Special
    } else if c == '\n' {
        CharClass::Newline
    } else if c == '\t' {
        CharClass::Tab
    } else {
        CharClass::Other
    }
}

pub fn is_supported(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return true;
    }
    let code = c as u32;
    if !(32..=127).contains(&code) {
        return false;
    }
    c.is_ascii_alphanumeric()
        || c == ' '
        || PUNCTUATION_CHARS.contains(c)
        || SPECIAL_CHARS.contains(c)
}

pub fn shifted_base_key(c: char) -> Option<&'static str> {
    SHIFTED
        .iter()
        .find(|(shifted, _)| *shifted == c)
        .map(|(_, base)| *base)
}

/// Resolve the key press for `c`, or `None` if `c` is unsupported.
pub fn resolve_action(c: char) -> Option<KeyAction> {
    match c {
        '\n' => return Some(KeyAction::Key(ENTER.to_string())),
        '\t' => return Some(KeyAction::Key(TAB.to_string())),
        _ => {}
    }

    if let Some(key) = shifted_base_key(c) {
        return Some(KeyAction::Combo {
            modifier: SHIFT,
            key,
        });
    }

    is_supported(c).then(|| KeyAction::Key(c.to_string()))
}

/// All unsupported characters in `text`, as (character index, character).
pub fn scan_unsupported(text: &str) -> Vec<(usize, char)> {
    text.chars()
        .enumerate()
        .filter(|&(_idx, c)| !is_supported(c))
        .collect()
}

pub fn find_first_unsupported_char(text: &str) -> Option<(usize, char)> {
    text.chars().enumerate().find(|&(_idx, c)| !is_supported(c))
}

/// Full-text validation run before a session starts.
pub fn validate_text(text: &str) -> Result<()> {
    let unsupported = scan_unsupported(text);
    if unsupported.is_empty() {
        return Ok(());
    }

    let count = unsupported.len();
    let sample = unsupported
        .into_iter()
        .take(UNSUPPORTED_SAMPLE_LEN)
        .collect();
    Err(TyperError::unsupported_characters(count, sample))
}
