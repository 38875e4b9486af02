//! Project configuration management for `weft.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # One module per TOML section
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # BundleConfig (this file)
//! ```
//!
//! Loading is three steps: parse (unknown fields are warned about),
//! normalize every path against the config file's directory, then validate
//! and report all problems at once.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    BuildSection, EntryConfig, EnvSection, ExtractSection, HtmlSection, OutputSection,
    ResolveSection, RuleConfig, ServeSection, SplitSection,
};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{
    cli::{Cli, Commands},
    log,
    utils::path::normalize_path,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing weft.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub entry: Vec<EntryConfig>,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub resolve: ResolveSection,

    #[serde(default)]
    pub rule: Vec<RuleConfig>,

    #[serde(default)]
    pub extract: ExtractSection,

    #[serde(default)]
    pub split: SplitSection,

    /// Constant substitutions (identifier path → JavaScript source text)
    #[serde(default)]
    pub define: BTreeMap<String, String>,

    #[serde(default)]
    pub env: EnvSection,

    /// Free identifier → module reference
    #[serde(default)]
    pub provide: BTreeMap<String, String>,

    #[serde(default)]
    pub html: Option<HtmlSection>,

    #[serde(default)]
    pub serve: ServeSection,
}

impl BundleConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file; the project root is the
    /// directory that contains it.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let Some(config_path) = find_config_file(&cli.config, &cwd) else {
            bail!(ConfigError::Validation(format!(
                "config file '{}' not found in {} or any parent directory",
                cli.config.display(),
                cwd.display()
            )));
        };

        let mut config = Self::from_path(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = normalize_path(&config_path);
        config.finalize(&root);
        config.apply_command_options(&cli.command);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Set the root and resolve every configured path against it.
    pub fn finalize(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.normalize_paths(&root);
        self.root = root;
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_command_options(&mut self, command: &Commands) {
        if let Commands::Serve {
            interface,
            port,
            watch,
            ..
        } = command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    fn normalize_paths(&mut self, root: &Path) {
        let at_root = |p: &Path| normalize_path(&root.join(p));

        self.build.context = at_root(self.build.context.as_path());
        self.build.output = at_root(self.build.output.as_path());

        for rule in &mut self.rule {
            rule.include = rule.include.iter().map(|p| at_root(p.as_path())).collect();
            rule.exclude = rule.exclude.iter().map(|p| at_root(p.as_path())).collect();
        }

        self.resolve.modules = self
            .resolve
            .modules
            .iter()
            .map(|p| at_root(p.as_path()))
            .collect();
        for target in self.resolve.alias.values_mut() {
            *target = at_root(target.as_path());
        }

        let context = self.build.context.clone();
        if let Some(html) = &mut self.html {
            html.template = normalize_path(&context.join(&html.template));
            if let Some(favicon) = html.favicon.take() {
                html.favicon = Some(normalize_path(&context.join(favicon)));
            }
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate the normalized configuration.
    ///
    /// Collects all validation errors and returns them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.validate_entries(&mut diag);
        self.build.validate(&self.root, &mut diag);
        self.output.validate(&mut diag);

        for (i, rule) in self.rule.iter().enumerate() {
            rule.validate(i, &mut diag);
        }

        let names: Vec<&str> = self.entry.iter().map(|e| e.name.as_str()).collect();
        self.split.validate(&names, &mut diag);

        if let Some(html) = &self.html {
            html.validate(&mut diag);
        }
        self.serve.validate(&mut diag);

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    fn validate_entries(&self, diag: &mut ConfigDiagnostics) {
        if self.entry.is_empty() {
            diag.error_with_hint(
                FieldPath::new("entry"),
                "at least one entry is required",
                "[[entry]]\nname = \"main\"\nimport = \"./index.js\"",
            );
        }

        let mut seen = BTreeSet::new();
        for (i, entry) in self.entry.iter().enumerate() {
            if entry.name.trim().is_empty() {
                diag.error(FieldPath::indexed("entry", i, "name"), "entry name is empty");
            } else if !seen.insert(entry.name.as_str()) {
                diag.error(
                    FieldPath::indexed("entry", i, "name"),
                    format!("duplicate entry name `{}`", entry.name),
                );
            }
            if entry.import.specifiers().iter().any(|s| s.trim().is_empty())
                || entry.import.specifiers().is_empty()
            {
                diag.error(FieldPath::indexed("entry", i, "import"), "empty import");
            }
        }
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config text. Panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> BundleConfig {
    let (parsed, ignored) = BundleConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Parse, normalize against `root`, and validate a project config.
#[cfg(test)]
pub fn test_project_config(root: &Path, content: &str) -> BundleConfig {
    let mut config = test_parse_config(content);
    config.config_path = root.join("weft.toml");
    config.finalize(root);
    if let Err(err) = config.validate() {
        panic!("test config is invalid: {err}");
    }
    config
}

// ============================================================================
// tests
// ============================================================================
