use std::fs;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, warn};

use crate::charset::{scan_unsupported, validate_text};
use crate::error::{Result, TyperError};

/// Load UTF-8 text from `path`, or from stdin when `path` is `-`.
pub fn load_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| TyperError::text_load("<stdin>", e.to_string()))?;
        return Ok(buf);
    }

    let text = fs::read_to_string(path)
        .map_err(|e| TyperError::text_load(path.display().to_string(), e.to_string()))?;
    debug!(path = %path.display(), chars = text.chars().count(), "loaded text");
    Ok(text)
}

/// Zero the bytes of loaded text before releasing it.
pub fn scrub_text(text: String) {
    let mut bytes = text.into_bytes();
    bytes.fill(0);
    std::hint::black_box(&bytes);
}

/// Check loaded text before a session. Rejects empty text, and unsupported
/// characters unless `allow_unsupported` is set. Rejected text is scrubbed.
pub fn prepare_text(text: String, allow_unsupported: bool) -> Result<String> {
    if text.trim().is_empty() {
        scrub_text(text);
        return Err(TyperError::EmptyText);
    }

    if allow_unsupported {
        let unsupported = scan_unsupported(&text).len();
        if unsupported > 0 {
            warn!(
                count = unsupported,
                "typing anyway; unsupported characters will be skipped and reported as failed"
            );
        }
        return Ok(text);
    }

    match validate_text(&text) {
        Ok(()) => Ok(text),
        Err(err) => {
            scrub_text(text);
            Err(err)
        }
    }
}
