use std::path::PathBuf;

use crate::consts::APP_NAME;

/// Returns the directory for cache files for the application.
///
/// Follows `XDG_CACHE_HOME` on Linux, falling back to `~/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
  dirs::cache_dir().map(|dir| dir.join(APP_NAME))
}
