//! URL to output file resolution.

use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};

/// Resolve a request URL to a file under `serve_root`; directories serve
/// their `index.html`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);
    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    // Canonicalize so symlinks cannot lead outside the output directory
    let canonical = serve_root.join(&clean).canonicalize().ok()?;
    let root = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }
    let index = canonical.join("index.html");
    index.is_file().then_some(index)
}

/// Decode, drop query and fragment, trim slashes.
pub fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}
