//! `[[rule]]` section configuration.
//!
//! Rules are evaluated in declaration order and every non-excluded match
//! applies; the matched chains are concatenated in rule order.
//!
//! ```toml
//! [[rule]]
//! test = "\\.scss$"
//! include = ["src"]
//! use = [{ kind = "style" }, { kind = "extract" }]
//!
//! [[rule]]
//! test = "\\.html$"
//! exclude = ["src/index.html"]
//! use = [{ kind = "file", name = "[name].[ext]" }]
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::transform::TransformSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Regex tested against the root-relative, slash-separated path
    pub test: String,
    /// Path prefixes the file must be under (empty: anywhere)
    #[serde(default)]
    pub include: Vec<PathBuf>,
    /// Path prefixes that veto the rule, beating `include` and `test`
    #[serde(default)]
    pub exclude: Vec<PathBuf>,
    #[serde(rename = "use")]
    pub stages: Vec<TransformSpec>,
}

impl RuleConfig {
    pub fn validate(&self, index: usize, diag: &mut ConfigDiagnostics) {
        if let Err(err) = Regex::new(&self.test) {
            diag.error_with_hint(
                FieldPath::indexed("rule", index, "test"),
                format!("invalid pattern `{}`", self.test),
                err.to_string(),
            );
        }

        if self.stages.is_empty() {
            diag.error(FieldPath::indexed("rule", index, "use"), "rule has no stages");
        }

        let emitting = self.stages.iter().filter(|s| s.declares_emission()).count();
        if emitting > 1 {
            diag.error(
                FieldPath::indexed("rule", index, "use"),
                "a rule may declare at most one of `file`, `url` or `extract`",
            );
        }

        for stage in &self.stages {
            if let Err(message) = stage.validate() {
                diag.error(FieldPath::indexed("rule", index, "use"), message);
            }
        }

        for (key, paths) in [("include", &self.include), ("exclude", &self.exclude)] {
            for path in paths.iter().filter(|p| !p.exists()) {
                diag.warn(
                    FieldPath::indexed("rule", index, key),
                    format!("`{}` does not exist", path.display()),
                );
            }
        }
    }
}
