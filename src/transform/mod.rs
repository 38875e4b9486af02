//! Transform stages and the chain executor.
//!
//! A chain is the concatenation of every matched rule's `use` list, run
//! strictly in order. Each stage is a pure function of its input payload
//! and options:
//!
//! ```text
//! Payload { bytes, kind, dependencies, emission, source_map }
//!     │
//!     ├── script    scan references, lower ES modules
//!     ├── style     scan @import / url()
//!     ├── html      scan tag attributes
//!     ├── template  Handlebars render
//!     ├── image     SVG cleanup
//!     ├── file/url  standalone emission (url may inline)
//!     ├── extract   stylesheet extraction
//!     └── define/provide
//!     ▼
//! Payload
//! ```

mod asset;
mod define;
mod executor;
mod markup;
mod payload;
mod script;
mod style;
mod template;

pub use executor::Executor;
pub use markup::rewrite_attributes;
pub use payload::{
    Dependency, DependencyKind, Emission, ModuleKind, Payload, SourceMapFragment, is_external,
    url_specifier,
};
pub use style::rewrite_urls;
pub use template::render as render_template;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::{BuildMode, ModuleId};

// ============================================================================
// stage specs
// ============================================================================

/// One stage of a rule's chain, tagged by `kind` in `weft.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformSpec {
    Script(ScriptOptions),
    Style(StyleOptions),
    Html(HtmlOptions),
    Template(TemplateOptions),
    Image(ImageOptions),
    File(FileOptions),
    Url(UrlOptions),
    Extract,
    Define(DefineOptions),
    Provide(ProvideOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Lower `import`/`export` to the chunk runtime's CommonJS form
    pub lower_esm: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self { lower_esm: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    /// Resolve `@import` into the module graph
    pub import: bool,
    /// Resolve `url()` references
    pub url: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            import: true,
            url: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlOptions {
    /// `tag:attribute` pairs whose values are asset references
    pub attributes: Vec<String>,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            attributes: vec!["img:src".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    pub remove_title: bool,
    pub remove_comments: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            remove_title: false,
            remove_comments: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// File name template (`[name]`, `[ext]`, `[hash]`, `[hash:N]`)
    pub name: String,
    /// Directory under the output root, e.g. `img/`
    pub output_path: String,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            name: "[name].[ext]".to_string(),
            output_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlOptions {
    pub name: String,
    pub output_path: String,
    /// Inline as a data URI below this many bytes
    pub limit: Option<usize>,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            name: "[name].[ext]".to_string(),
            output_path: String::new(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefineOptions {
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvideOptions {
    pub bindings: BTreeMap<String, String>,
}

impl TransformSpec {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Style(_) => "style",
            Self::Html(_) => "html",
            Self::Template(_) => "template",
            Self::Image(_) => "image",
            Self::File(_) => "file",
            Self::Url(_) => "url",
            Self::Extract => "extract",
            Self::Define(_) => "define",
            Self::Provide(_) => "provide",
        }
    }

    /// Whether the stage decides where the module's bytes are written.
    pub const fn declares_emission(&self) -> bool {
        matches!(self, Self::File(_) | Self::Url(_) | Self::Extract)
    }

    /// Check options that deserialization alone cannot.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Html(options) => {
                for pair in &options.attributes {
                    match pair.split_once(':') {
                        Some((tag, attr)) if !tag.is_empty() && !attr.is_empty() => {}
                        _ => return Err(format!("html attribute `{pair}` is not `tag:attribute`")),
                    }
                }
                Ok(())
            }
            Self::File(FileOptions { name, output_path })
            | Self::Url(UrlOptions {
                name, output_path, ..
            }) => {
                if name.trim().is_empty() {
                    return Err(format!("{} stage needs a non-empty `name`", self.name()));
                }
                if output_path.starts_with('/') || output_path.split('/').any(|p| p == "..") {
                    return Err(format!(
                        "`output_path = \"{output_path}\"` must stay inside the output directory"
                    ));
                }
                Ok(())
            }
            Self::Define(options) => match options.values.keys().find(|k| k.trim().is_empty()) {
                Some(_) => Err("define keys must not be empty".to_string()),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Run this stage on `input`.
    pub fn apply(&self, ctx: &StageContext<'_>, input: Payload) -> Result<Payload, StageError> {
        match self {
            Self::Script(options) => script::apply(options, ctx, input),
            Self::Style(options) => style::apply(options, input),
            Self::Html(options) => markup::apply(options, input),
            Self::Template(options) => template::apply(options, input),
            Self::Image(options) => asset::image(options, ctx, input),
            Self::File(options) => Ok(asset::file(options, input)),
            Self::Url(options) => Ok(asset::url(options, input)),
            Self::Extract => style::extract(input),
            Self::Define(options) => define::define(options, input),
            Self::Provide(options) => define::provide(options, input),
        }
    }
}

// ============================================================================
// stage context & errors
// ============================================================================

/// Read-only facts about the file being transformed.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub path: &'a Path,
    pub id: &'a ModuleId,
    pub mode: BuildMode,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("expects {expected} input, got {found}")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Parse(String),

    #[error("render failed: {0}")]
    Render(String),
}
