//! `[[entry]]` section configuration.
//!
//! Declaration order is chunk priority: earlier entries claim shared modules
//! first when commons extraction is off.
//!
//! ```toml
//! [[entry]]
//! name = "main"
//! import = "./js/index.js"
//!
//! [[entry]]
//! name = "vendor"
//! import = ["babel-polyfill", "./js/vendor.js"]
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryConfig {
    pub name: String,
    pub import: EntryImport,
}

/// One or more references resolved from the source root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EntryImport {
    One(String),
    Many(Vec<String>),
}

impl EntryImport {
    pub fn specifiers(&self) -> Vec<&str> {
        match self {
            Self::One(one) => vec![one.as_str()],
            Self::Many(many) => many.iter().map(String::as_str).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_entries_keep_declaration_order() {
        let config = test_parse_config(
            "[[entry]]\nname = \"b\"\nimport = \"./b.js\"\n[[entry]]\nname = \"a\"\nimport = [\"poly\", \"./a.js\"]",
        );
        assert_eq!(config.entry.len(), 2);
        assert_eq!(config.entry[0].name, "b");
        assert_eq!(config.entry[0].import.specifiers(), vec!["./b.js"]);
        assert_eq!(config.entry[1].import.specifiers(), vec!["poly", "./a.js"]);
    }
}
