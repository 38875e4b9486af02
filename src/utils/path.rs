//! Path normalization and root-relative naming.

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to lexical cleanup of the absolute form for paths that do not
/// exist yet, such as an output directory before the first build.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        };
        clean(&absolute)
    })
}

/// Lexically remove `.` and `..` components.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Root-relative path with forward slashes.
///
/// Paths outside `root` keep their full form, still slash-separated.
pub fn slash_relative(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => None,
            Component::ParentDir => Some("..".to_string()),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Join URL-ish path segments with exactly one `/` between them.
pub fn join_url(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            rest.trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_normalize_missing_path_is_cleaned() {
        let normalized = normalize_path(Path::new("/no/such/dir/../file.js"));
        assert_eq!(normalized, PathBuf::from("/no/such/file.js"));
    }

    #[test]
    fn test_slash_relative() {
        let root = Path::new("/project");
        assert_eq!(
            slash_relative(root, Path::new("/project/src/js/index.js")),
            "src/js/index.js"
        );
        assert_eq!(slash_relative(root, Path::new("/elsewhere/a.js")), "/elsewhere/a.js");
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("", "js/main.js"), "js/main.js");
        assert_eq!(join_url("/assets/", "js/main.js"), "/assets/js/main.js");
        assert_eq!(join_url("/assets", "/js/main.js"), "/assets/js/main.js");
        assert_eq!(join_url("img/", ""), "img/");
    }
}
