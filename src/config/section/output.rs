//! `[output]` section configuration.
//!
//! Templates accept `[name]`, `[ext]`, `[hash]` and `[hash:N]`.
//! Development builds strip hash placeholders; production builds insert
//! `.[hash:8]` before the extension of a chunk template that has none.
//! Pass-through files keep their path and carry the hash as a query.
//!
//! ```toml
//! [output]
//! filename = "js/[name].bundle.js"
//! asset_filename = "[name].[ext]?[hash:8]"
//! manifest = "manifest.json"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Chunk file name template
    pub filename: String,
    /// Template for referenced files that match no rule
    pub asset_filename: String,
    /// Manifest file name, relative to the output directory
    pub manifest: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            filename: "[name].js".into(),
            asset_filename: "[name].[ext]?[hash:8]".into(),
            manifest: "manifest.json".into(),
        }
    }
}

impl OutputSection {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.filename.contains("[name]") {
            diag.error_with_hint(
                FieldPath::new("output.filename"),
                "chunk file names must contain [name]",
                "e.g. \"js/[name].bundle.js\"",
            );
        }
        if self.manifest.trim().is_empty() {
            diag.error(FieldPath::new("output.manifest"), "manifest name is empty");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_output_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.output.filename, "[name].js");
        assert_eq!(config.output.asset_filename, "[name].[ext]?[hash:8]");
        assert_eq!(config.output.manifest, "manifest.json");
    }
}
