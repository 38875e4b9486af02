//! `[extract]` section configuration.
//!
//! Style modules whose chain contains an `extract` stage are written as
//! standalone stylesheets instead of being injected by script.
//!
//! ```toml
//! [extract]
//! filename = "css/[name].css"
//! name = "styles"       # Stylesheet name when all_chunks = true
//! all_chunks = true     # One stylesheet for the build instead of one per chunk
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSection {
    pub filename: String,
    pub name: String,
    pub all_chunks: bool,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            filename: "[name].css".into(),
            name: "styles".into(),
            all_chunks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_extract_section() {
        let config = test_parse_config("[extract]\nfilename = \"css/styles.css\"\nall_chunks = false");
        assert_eq!(config.extract.filename, "css/styles.css");
        assert_eq!(config.extract.name, "styles");
        assert!(!config.extract.all_chunks);
    }
}
