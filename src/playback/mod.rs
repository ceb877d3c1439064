pub mod backends;
mod util;

pub use util::print_progress_line;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::focus::{AssumeFocused, FocusProbe};
use crate::injector::KeyBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackBackend {
    Auto,
    X11,
    /// Log keystrokes instead of sending them.
    DryRun,
}

impl PlaybackBackend {
    pub fn name(self) -> &'static str {
        match self {
            PlaybackBackend::Auto => "auto",
            PlaybackBackend::X11 => "x11",
            PlaybackBackend::DryRun => "dry-run",
        }
    }
}

fn env_is_set(name: &str) -> bool {
    std::env::var_os(name)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

fn auto_backend() -> PlaybackBackend {
    // Wayland sessions usually run Xwayland and export DISPLAY too; XTEST then
    // reaches X clients only, which is still the common VM-viewer case.
    if env_is_set("DISPLAY") {
        return PlaybackBackend::X11;
    }

    PlaybackBackend::Auto
}

fn backend_unavailable_message() -> String {
    let xdg_session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();

    let mut parts = Vec::new();

    if env_is_set("WAYLAND_DISPLAY") {
        parts.push("WAYLAND_DISPLAY is set".to_string());
    }
    if env_is_set("DISPLAY") {
        parts.push("DISPLAY is set".to_string());
    }
    if !xdg_session_type.is_empty() {
        parts.push(format!("XDG_SESSION_TYPE={xdg_session_type}"));
    }

    if parts.is_empty() {
        "No display session detected (expected DISPLAY for X11).".to_string()
    } else {
        format!("Detected environment: {}", parts.join(", "))
    }
}

fn require_supported_backend(
    #[allow(unused_variables)] selected: PlaybackBackend,
    resolved: PlaybackBackend,
) -> Result<()> {
    match resolved {
        PlaybackBackend::DryRun => Ok(()),
        PlaybackBackend::X11 => {
            #[cfg(feature = "x11")]
            {
                Ok(())
            }

            #[cfg(not(feature = "x11"))]
            {
                let how = match selected {
                    PlaybackBackend::Auto => "detected",
                    _ => "requested",
                };
                Err(anyhow!(
                    "X11 backend {how} but is disabled in this build. (Rebuild with `--features x11`.) {details}",
                    how = how,
                    details = backend_unavailable_message()
                ))
            }
        }
        PlaybackBackend::Auto => {
            let hint = if cfg!(feature = "x11") {
                "Try passing --backend x11 to force it, or --backend dry-run to test without typing."
            } else {
                "This build has no keystroke backends enabled; only --backend dry-run is available."
            };

            Err(anyhow!(
                "No supported keystroke backend detected. {details}\n{hint}",
                details = backend_unavailable_message(),
                hint = hint,
            ))
        }
    }
}

pub fn resolve_backend(requested: PlaybackBackend) -> Result<PlaybackBackend> {
    let resolved = match requested {
        PlaybackBackend::Auto => auto_backend(),
        other => other,
    };

    require_supported_backend(requested, resolved)?;
    Ok(resolved)
}

/// An opened keystroke backend and the focus probe that goes with it.
pub struct OpenedBackend {
    pub kind: PlaybackBackend,
    pub keys: Box<dyn KeyBackend + Send>,
    pub focus: Box<dyn FocusProbe + Send>,
}

impl std::fmt::Debug for OpenedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedBackend")
            .field("kind", &self.kind)
            .field("keys", &self.keys.name())
            .finish_non_exhaustive()
    }
}

pub fn open_backend(requested: PlaybackBackend) -> Result<OpenedBackend> {
    let kind = resolve_backend(requested)?;
    info!(backend = kind.name(), "opening keystroke backend");

    match kind {
        PlaybackBackend::DryRun => Ok(OpenedBackend {
            kind,
            keys: Box::new(backends::dry_run::DryRunBackend::new()),
            focus: Box::new(AssumeFocused),
        }),
        PlaybackBackend::X11 => {
            #[cfg(feature = "x11")]
            {
                Ok(OpenedBackend {
                    kind,
                    keys: Box::new(backends::x11::X11Backend::connect()?),
                    focus: Box::new(backends::x11::X11FocusProbe::connect()?),
                })
            }

            #[cfg(not(feature = "x11"))]
            {
                Err(anyhow!(
                    "X11 backend is disabled in this build (rebuild with `--features x11`)."
                ))
            }
        }
        PlaybackBackend::Auto => Err(anyhow!("no backend resolved")),
    }
}
