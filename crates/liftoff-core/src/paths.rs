//! Well-known filesystem locations.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the liftoff home directory, or None if the user's home cannot be resolved.
///
/// `LIFTOFF_HOME` takes precedence over `~/.liftoff`.
pub fn try_liftoff_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("LIFTOFF_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".liftoff"))
}

/// Default directory for generated key pairs: `~/.liftoff/keys`
pub fn keys_dir() -> Option<PathBuf> {
    try_liftoff_home().map(|home| home.join("keys"))
}
