//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find config file by searching upward from `start`.
///
/// Returns the absolute path to the config file if found.
///
/// ```text
/// /home/user/app/src/js/    ← start
/// /home/user/app/weft.toml  ← found
/// ```
pub fn find_config_file(config_name: &Path, start: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}
