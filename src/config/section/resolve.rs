//! `[resolve]` section configuration.
//!
//! ```toml
//! [resolve]
//! extensions = [".js", ".json", ".scss"]   # Tried in order after the exact name
//! modules = ["src", "node_modules"]        # Search path for bare references
//!
//! [resolve.alias]
//! "@" = "src"                              # Prefix substitution, tried first
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSection {
    pub extensions: Vec<String>,
    pub modules: Vec<PathBuf>,
    pub alias: BTreeMap<String, PathBuf>,
}

impl Default for ResolveSection {
    fn default() -> Self {
        Self {
            extensions: vec![".js".into(), ".json".into()],
            modules: vec!["node_modules".into()],
            alias: BTreeMap::new(),
        }
    }
}

impl ResolveSection {
    /// Extensions with a leading dot, whatever the config spelled.
    pub fn dotted_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.clone()
                } else {
                    format!(".{ext}")
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_resolve_section() {
        let config = test_parse_config(
            "[resolve]\nextensions = [\".js\", \"scss\"]\nmodules = [\"src\"]\n[resolve.alias]\n\"@\" = \"src\"",
        );
        assert_eq!(config.resolve.dotted_extensions(), vec![".js", ".scss"]);
        assert_eq!(config.resolve.modules, vec![std::path::PathBuf::from("src")]);
        assert_eq!(
            config.resolve.alias.get("@"),
            Some(&std::path::PathBuf::from("src"))
        );
    }
}
