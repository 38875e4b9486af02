//! `[split]` section configuration.
//!
//! ```toml
//! [split]
//! commons = "common"        # Shared chunk for modules reached by 2+ entries
//! max_chunks = 10
//! min_chunk_size = 10000    # Bytes; smaller non-entry chunks fold into an entry
//!
//! [[split.force]]
//! test = "^node_modules/"   # Module ids matching this go to the named chunk
//! name = "vendor"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitSection {
    pub commons: Option<String>,
    pub max_chunks: Option<usize>,
    pub min_chunk_size: Option<usize>,
    pub force: Vec<ForceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceConfig {
    pub test: String,
    pub name: String,
}

impl SplitSection {
    pub fn validate(&self, entry_names: &[&str], diag: &mut ConfigDiagnostics) {
        if self.max_chunks == Some(0) {
            diag.error(FieldPath::new("split.max_chunks"), "must be at least 1");
        }

        if let Some(commons) = &self.commons
            && entry_names.contains(&commons.as_str())
        {
            diag.error(
                FieldPath::new("split.commons"),
                format!("`{commons}` is already an entry name"),
            );
        }

        for (i, force) in self.force.iter().enumerate() {
            if let Err(err) = Regex::new(&force.test) {
                diag.error_with_hint(
                    FieldPath::indexed("split.force", i, "test"),
                    format!("invalid pattern `{}`", force.test),
                    err.to_string(),
                );
            }
            if entry_names.contains(&force.name.as_str()) {
                diag.error(
                    FieldPath::indexed("split.force", i, "name"),
                    format!("`{}` is already an entry name", force.name),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_split_section() {
        let config = test_parse_config(
            "[split]\ncommons = \"common\"\nmax_chunks = 2\n[[split.force]]\ntest = \"^vendor/\"\nname = \"vendor\"",
        );
        assert_eq!(config.split.commons.as_deref(), Some("common"));
        assert_eq!(config.split.max_chunks, Some(2));
        assert_eq!(config.split.force[0].name, "vendor");
    }

    #[test]
    fn test_split_name_clash() {
        let config = test_parse_config("[split]\ncommons = \"main\"\nmax_chunks = 0");
        let mut diag = ConfigDiagnostics::new();
        config.split.validate(&["main"], &mut diag);
        assert_eq!(diag.len(), 2);
    }
}
