pub mod dry_run;

#[cfg(feature = "x11")]
pub mod x11;

// Modifiers released when a backend opens and closes, so an aborted run never
// leaves one held.
#[cfg_attr(not(feature = "x11"), allow(dead_code))]
pub(crate) const COMMON_MODIFIER_KEYCODES: [u32; 6] = [
    crate::keyboard::KEY_LEFTSHIFT,
    crate::keyboard::KEY_RIGHTSHIFT,
    crate::keyboard::KEY_LEFTCTRL,
    crate::keyboard::KEY_RIGHTCTRL,
    crate::keyboard::KEY_LEFTALT,
    crate::keyboard::KEY_RIGHTALT,
];
