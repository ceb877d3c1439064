use tracing::warn;

/// Clear the system clipboard so no typed content lingers after shutdown.
///
/// Best effort: failures are logged, never returned.
#[cfg(feature = "clipboard")]
pub fn clear_clipboard() {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.clear()) {
        Ok(()) => tracing::debug!("clipboard cleared"),
        Err(e) => warn!("failed to clear clipboard: {e}"),
    }
}

#[cfg(not(feature = "clipboard"))]
pub fn clear_clipboard() {
    warn!("cannot clear clipboard: clipboard support is disabled in this build (rebuild with `--features clipboard`)");
}
