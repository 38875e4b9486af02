//! Reference resolution.
//!
//! For a reference made from a directory, candidate bases are tried in
//! this order:
//!
//! 1. alias prefixes (`@/js/app` with `@ = "src"`)
//! 2. relative (`./`, `../`) or absolute paths
//! 3. each module directory, in declared order
//!
//! and for every base: the exact file, then the base with each configured
//! extension, then `index.<ext>` inside it as a directory. The first
//! existing file wins.

use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::config::ResolveSection;
use crate::utils::path::normalize_path;

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Dotted extensions (`.js`), in declared order
    pub extensions: Vec<String>,
    /// Absolute module directories
    pub modules: Vec<PathBuf>,
    /// Longest prefix first
    pub alias: Vec<(String, PathBuf)>,
}

impl ResolveOptions {
    pub fn from_config(section: &ResolveSection) -> Self {
        let mut alias: Vec<(String, PathBuf)> = section
            .alias
            .iter()
            .map(|(prefix, target)| (prefix.clone(), target.clone()))
            .collect();
        alias.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self {
            extensions: section.dotted_extensions(),
            modules: section.modules.clone(),
            alias,
        }
    }
}

/// Memoizing resolver, shared by every worker of a pass.
pub struct Resolver {
    options: ResolveOptions,
    cache: DashMap<(PathBuf, String), Option<PathBuf>>,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            cache: DashMap::new(),
        }
    }

    /// Resolve `reference` made from a file in `from_dir`.
    pub fn resolve(&self, from_dir: &Path, reference: &str) -> Option<PathBuf> {
        let key = (from_dir.to_path_buf(), reference.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let resolved = self.resolve_uncached(from_dir, reference);
        self.cache.insert(key, resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, from_dir: &Path, reference: &str) -> Option<PathBuf> {
        let reference = reference.split(['?', '#']).next().unwrap_or(reference);
        if reference.is_empty() {
            return None;
        }

        self.candidates(from_dir, reference)
            .into_iter()
            .find_map(|base| self.probe(&base))
            .map(|path| normalize_path(&path))
    }

    fn candidates(&self, from_dir: &Path, reference: &str) -> Vec<PathBuf> {
        for (prefix, target) in &self.options.alias {
            if reference == prefix {
                return vec![target.clone()];
            }
            if let Some(rest) = reference.strip_prefix(prefix.as_str())
                && let Some(rest) = rest.strip_prefix('/')
            {
                return vec![target.join(rest)];
            }
        }

        if reference.starts_with("./") || reference.starts_with("../") || reference == "." || reference == ".." {
            return vec![from_dir.join(reference)];
        }
        if Path::new(reference).is_absolute() {
            return vec![PathBuf::from(reference)];
        }

        self.options
            .modules
            .iter()
            .map(|dir| dir.join(reference))
            .collect()
    }

    /// Exact file, then extensions, then `index.<ext>`.
    fn probe(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }

        let base_str = base.as_os_str().to_string_lossy();
        for ext in &self.options.extensions {
            let candidate = PathBuf::from(format!("{base_str}{ext}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }

        if base.is_dir() {
            for ext in &self.options.extensions {
                let candidate = base.join(format!("index{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        for (path, content) in [
            ("src/js/index.js", ""),
            ("src/js/util.js", ""),
            ("src/js/util.json", "{}"),
            ("src/js/widgets/index.js", ""),
            ("src/styles/main.scss", ""),
            ("src/local/lodash.js", ""),
            ("node_modules/lodash/index.js", ""),
            ("node_modules/jquery.js", ""),
        ] {
            let file = root.join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }

        let options = ResolveOptions {
            extensions: vec![".js".into(), ".json".into(), ".scss".into()],
            modules: vec![root.join("src"), root.join("node_modules")],
            alias: vec![("@".into(), root.join("src"))],
        };
        (dir, Resolver::new(options))
    }

    #[test]
    fn test_relative_with_extension_order() {
        let (dir, resolver) = setup();
        let root = normalize_path(dir.path());
        let from = root.join("src/js");
        assert_eq!(resolver.resolve(&from, "./util"), Some(root.join("src/js/util.js")));
        assert_eq!(resolver.resolve(&from, "./util.json"), Some(root.join("src/js/util.json")));
        assert_eq!(resolver.resolve(&from, "../styles/main"), Some(root.join("src/styles/main.scss")));
    }

    #[test]
    fn test_directory_index() {
        let (dir, resolver) = setup();
        let root = normalize_path(dir.path());
        assert_eq!(
            resolver.resolve(&root.join("src/js"), "./widgets"),
            Some(root.join("src/js/widgets/index.js"))
        );
    }

    #[test]
    fn test_alias_and_module_directories() {
        let (dir, resolver) = setup();
        let root = normalize_path(dir.path());
        let from = root.join("src/js");
        assert_eq!(resolver.resolve(&from, "@/js/util"), Some(root.join("src/js/util.js")));
        assert_eq!(resolver.resolve(&from, "jquery"), Some(root.join("node_modules/jquery.js")));
        // Module directories are searched in declared order
        assert_eq!(resolver.resolve(&from, "local/lodash"), Some(root.join("src/local/lodash.js")));
        assert_eq!(resolver.resolve(&from, "lodash"), Some(root.join("node_modules/lodash/index.js")));
    }

    #[test]
    fn test_unresolvable() {
        let (dir, resolver) = setup();
        let root = normalize_path(dir.path());
        assert_eq!(resolver.resolve(&root.join("src/js"), "./missing"), None);
        assert_eq!(resolver.resolve(&root.join("src/js"), "missing-package"), None);
    }

    #[test]
    fn test_query_suffix_is_ignored() {
        let (dir, resolver) = setup();
        let root = normalize_path(dir.path());
        assert_eq!(
            resolver.resolve(&root.join("src/js"), "./util?inline"),
            Some(root.join("src/js/util.js"))
        );
    }
}
