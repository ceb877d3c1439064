//! Focus-check boundary.

/// Reports whether the window that will receive keystrokes is the intended
/// target. An empty pattern list means "assume focused".
pub trait FocusProbe {
    fn is_target_focused(&mut self, patterns: &[String]) -> bool;
}

impl<T: FocusProbe + ?Sized> FocusProbe for Box<T> {
    fn is_target_focused(&mut self, patterns: &[String]) -> bool {
        (**self).is_target_focused(patterns)
    }
}

/// Probe for environments without window inspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeFocused;

impl FocusProbe for AssumeFocused {
    fn is_target_focused(&mut self, _patterns: &[String]) -> bool {
        true
    }
}

/// Case-insensitive substring match of a window title against any pattern.
pub fn title_matches(title: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    patterns
        .iter()
        .any(|pattern| title.contains(&pattern.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_patterns_assume_focus() {
        assert!(title_matches("", &[]));
        assert!(title_matches("anything", &[]));
        assert!(AssumeFocused.is_target_focused(&patterns(&["VirtualBox"])));
    }

    #[test]
    fn matches_any_pattern_case_insensitively() {
        let p = patterns(&["virtualbox", "QEMU"]);
        assert!(title_matches("win10 [Running] - Oracle VM VirtualBox", &p));
        assert!(title_matches("qemu-system-x86_64", &p));
        assert!(!title_matches("Terminal", &p));
        assert!(!title_matches("", &p));
    }
}
