//! `[html]` section configuration.
//!
//! ```toml
//! [html]
//! template = "index.html"     # Relative to build.context
//! filename = "index.html"     # Relative to build.output
//! favicon = "img/favicon.png"
//! title = "My App"            # Available as {{title}} when render = true
//! inject = true               # Insert <link>/<script> tags
//! append_hash = false         # Add ?<build hash> to injected URLs
//! render = false              # Render the template with Handlebars first
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlSection {
    pub template: PathBuf,
    pub filename: String,
    pub favicon: Option<PathBuf>,
    pub title: Option<String>,
    pub inject: bool,
    pub append_hash: bool,
    pub render: bool,
}

impl Default for HtmlSection {
    fn default() -> Self {
        Self {
            template: "index.html".into(),
            filename: "index.html".into(),
            favicon: None,
            title: None,
            inject: true,
            append_hash: false,
            render: false,
        }
    }
}

impl HtmlSection {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.template.is_file() {
            diag.error(
                FieldPath::new("html.template"),
                format!("template `{}` not found", self.template.display()),
            );
        }
        if let Some(favicon) = &self.favicon
            && !favicon.is_file()
        {
            diag.error(
                FieldPath::new("html.favicon"),
                format!("favicon `{}` not found", favicon.display()),
            );
        }
        if self.filename.trim().is_empty() {
            diag.error(FieldPath::new("html.filename"), "file name is empty");
        }
    }
}
