//! Values threaded through a transform chain.

use serde::Serialize;

/// What a module is once its chain has run. Decides how the emitter
/// serializes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Lowered script, wrapped in a module factory
    Script,
    /// Stylesheet text; extracted or injected through a `<style>` tag
    Style,
    /// Markup text; exported as a string
    Markup,
    /// Opaque bytes; written as a file or inlined as a data URI
    Asset,
}

impl ModuleKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Markup => "markup",
            Self::Asset => "asset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Code dependency (`import`, `require`, `@import`); its module is
    /// pulled into the referencing chunk
    Import,
    /// Asset reference (`url()`, `<img src>`); rewritten to the emitted URL
    Url,
}

/// A reference found by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    /// Text as written in the source
    pub raw: String,
    /// Specifier handed to the resolver
    pub specifier: String,
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn import(specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        Self {
            raw: specifier.clone(),
            specifier,
            kind: DependencyKind::Import,
        }
    }

    pub fn url(raw: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            specifier: specifier.into(),
            kind: DependencyKind::Url,
        }
    }
}

/// Where a module's bytes end up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Emission {
    /// Serialized into the chunk that owns the module
    Inline,
    /// Collected into an extracted stylesheet
    Extract,
    /// Written as its own file
    File { name: String, output_path: String },
    /// Written as its own file unless smaller than `limit`, then inlined as
    /// a data URI
    Url {
        name: String,
        output_path: String,
        limit: Option<usize>,
    },
}

impl Emission {
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline)
    }
}

/// Identity line mapping from a module's output back to its source.
///
/// Stages that keep line structure (every built-in script stage) only carry
/// the original text; the emitter offsets it by the module's position in
/// the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceMapFragment {
    pub source: String,
    pub content: String,
}

/// Bytes plus the metadata side-channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub kind: ModuleKind,
    pub dependencies: Vec<Dependency>,
    pub emission: Emission,
    pub source_map: Option<SourceMapFragment>,
}

impl Payload {
    /// Raw source bytes before any stage has run.
    pub fn source(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            kind: ModuleKind::Asset,
            dependencies: Vec::new(),
            emission: Emission::Inline,
            source_map: None,
        }
    }

    /// Record a dependency, keeping first-seen order and dropping repeats.
    pub fn depend(&mut self, dependency: Dependency) {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }
}

/// Whether a reference points outside the build (absolute URL, data URI,
/// fragment, template expression).
pub fn is_external(reference: &str) -> bool {
    let reference = reference.trim();
    reference.is_empty()
        || reference.starts_with("data:")
        || reference.starts_with('#')
        || reference.starts_with("//")
        || reference.contains("://")
        || reference.starts_with("mailto:")
        || reference.contains("{{")
}

/// Turn a URL-style reference into a resolver specifier.
///
/// Bare references are relative to the referencing file; a leading `~`
/// opts into module-directory lookup. Root-relative URLs (`/img/a.png`) are
/// served as-is. Query strings and fragments are dropped.
pub fn url_specifier(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if is_external(raw) || raw.starts_with('/') {
        return None;
    }
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }

    let specifier = if let Some(module) = raw.strip_prefix('~') {
        module.to_string()
    } else if raw.starts_with('.') {
        raw.to_string()
    } else {
        format!("./{raw}")
    };
    Some(specifier)
}
