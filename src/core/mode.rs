//! Build mode and the behavior it switches.
//!
//! The mode is fixed for a session. Everything mode-dependent reads
//! [`ModeProfile`] instead of matching on [`BuildMode`] directly.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transform::{DefineOptions, ProvideOptions, TransformSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[value(alias = "dev")]
    Development,
    #[value(alias = "prod")]
    Production,
}

impl BuildMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub const fn profile(self) -> ModeProfile {
        match self {
            Self::Development => ModeProfile::DEVELOPMENT,
            Self::Production => ModeProfile::PRODUCTION,
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switches derived from the build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeProfile {
    /// Content hashes in output file names
    pub hash_names: bool,
    /// `.map` files for script chunks
    pub source_maps: bool,
    /// Chunk-level JS and CSS minification
    pub minify: bool,
    /// Keep the previous module when a transform fails
    pub retain_stale: bool,
}

impl ModeProfile {
    pub const PRODUCTION: Self = Self {
        hash_names: true,
        source_maps: false,
        minify: true,
        retain_stale: false,
    };

    pub const DEVELOPMENT: Self = Self {
        hash_names: false,
        source_maps: true,
        minify: false,
        retain_stale: true,
    };
}

/// Script-level constants shared by every script chain of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptConstants {
    /// Identifier path → replacement source text
    pub defines: BTreeMap<String, String>,
    /// Free identifier → module reference
    pub provide: BTreeMap<String, String>,
}

impl ScriptConstants {
    /// Constants for `mode`: configured defines plus `process.env.NODE_ENV`.
    pub fn for_mode(
        mode: BuildMode,
        defines: impl IntoIterator<Item = (String, String)>,
        provide: BTreeMap<String, String>,
    ) -> Self {
        let mut all: BTreeMap<String, String> = defines.into_iter().collect();
        all.insert(
            "process.env.NODE_ENV".to_string(),
            format!("\"{}\"", mode.as_str()),
        );
        Self {
            defines: all,
            provide,
        }
    }

    /// Append `define` and `provide` stages to chains that contain a script
    /// stage, so substitution happens before chunk minification.
    pub fn augment(&self, chain: &mut Vec<TransformSpec>) {
        if !chain.iter().any(|s| matches!(s, TransformSpec::Script(_))) {
            return;
        }
        if !self.defines.is_empty() {
            chain.push(TransformSpec::Define(DefineOptions {
                values: self.defines.clone(),
            }));
        }
        if !self.provide.is_empty() {
            chain.push(TransformSpec::Provide(ProvideOptions {
                bindings: self.provide.clone(),
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{ScriptOptions, StyleOptions};

    #[test]
    fn test_profiles() {
        assert!(BuildMode::Production.profile().hash_names);
        assert!(BuildMode::Production.profile().minify);
        assert!(!BuildMode::Development.profile().hash_names);
        assert!(BuildMode::Development.profile().source_maps);
    }

    #[test]
    fn test_node_env_defined_for_both_modes() {
        let dev = ScriptConstants::for_mode(BuildMode::Development, [], BTreeMap::new());
        let prod = ScriptConstants::for_mode(BuildMode::Production, [], BTreeMap::new());
        assert_eq!(dev.defines["process.env.NODE_ENV"], "\"development\"");
        assert_eq!(prod.defines["process.env.NODE_ENV"], "\"production\"");
    }

    #[test]
    fn test_augment_only_script_chains() {
        let mut provide = BTreeMap::new();
        provide.insert("_".to_string(), "lodash".to_string());
        let constants = ScriptConstants::for_mode(BuildMode::Production, [], provide);

        let mut script = vec![TransformSpec::Script(ScriptOptions::default())];
        constants.augment(&mut script);
        assert_eq!(script.len(), 3);
        assert!(matches!(script[1], TransformSpec::Define(_)));
        assert!(matches!(script[2], TransformSpec::Provide(_)));

        let mut style = vec![TransformSpec::Style(StyleOptions::default())];
        constants.augment(&mut style);
        assert_eq!(style.len(), 1);
    }
}
