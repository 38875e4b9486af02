//! `[build]` section configuration.
//!
//! ```toml
//! [build]
//! context = "src"          # Source root; entries and html paths are relative to it
//! output = "dist"          # Output directory, reset by every full build
//! public_path = ""         # URL prefix for emitted files
//! timeout_ms = 30000       # Per-chain and write-phase deadline
//! workers = 8              # Transform pool size (default: available parallelism)
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    pub context: PathBuf,
    pub output: PathBuf,
    pub public_path: String,
    pub timeout_ms: u64,
    pub workers: Option<usize>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            context: "src".into(),
            output: "dist".into(),
            public_path: String::new(),
            timeout_ms: 30_000,
            workers: None,
        }
    }
}

impl BuildSection {
    /// Validate normalized paths. `root` is the project root.
    pub fn validate(&self, root: &std::path::Path, diag: &mut ConfigDiagnostics) {
        if !self.context.is_dir() {
            diag.error(
                FieldPath::new("build.context"),
                format!("source directory `{}` does not exist", self.context.display()),
            );
        }

        // Full builds wipe the output directory
        if self.output == root || root.starts_with(&self.output) {
            diag.error_with_hint(
                FieldPath::new("build.output"),
                "output directory must not contain the project root",
                "use a dedicated directory such as \"dist\"",
            );
        } else if self.context.starts_with(&self.output) {
            diag.error(
                FieldPath::new("build.output"),
                "output directory must not contain the source directory",
            );
        }

        if self.timeout_ms == 0 {
            diag.error(FieldPath::new("build.timeout_ms"), "timeout must be positive");
        }

        if self.workers == Some(0) {
            diag.error(FieldPath::new("build.workers"), "worker count must be positive");
        }
    }
}
