//! Validation of client-supplied file names.
//!
//! The stats-serving routes take a file name from the URL and read it from
//! the static directory. Only a single plain path segment is accepted, so a
//! request can never address anything outside that directory.

use crate::error::{AppError, AppResult};

/// Maximum length for a served file name.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Validate a file name taken from a URL path segment.
///
/// Rules:
/// - between 1 and 255 bytes
/// - no `/`, `\` or NUL
/// - not `.` or `..`, and no leading dot (hidden files)
///
/// Failures are reported as `NotFound` so probing for paths looks the same
/// as asking for a missing file.
pub fn validate_file_name(name: &str) -> AppResult<()> {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LENGTH {
        return Err(AppError::NotFound(format!("file {name:?}")));
    }

    if name.starts_with('.') {
        return Err(AppError::NotFound(format!("file {name:?}")));
    }

    if name.contains(['/', '\\', '\0']) {
        return Err(AppError::NotFound(format!("file {name:?}")));
    }

    Ok(())
}
