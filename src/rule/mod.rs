//! Rule matching.
//!
//! A rule applies to a file when its pattern matches the root-relative,
//! slash-separated path, the file is under one of its `include` roots (or
//! it has none), and it is under none of its `exclude` paths. Exclusion
//! always wins.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, RuleConfig};
use crate::transform::TransformSpec;
use crate::utils::path::slash_relative;

/// A compiled `[[rule]]`.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Declaration index, used in diagnostics
    pub index: usize,
    pub pattern: Regex,
    pub include: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
    pub chain: Vec<TransformSpec>,
}

impl Rule {
    pub fn compile(index: usize, config: &RuleConfig) -> Result<Self, ConfigError> {
        let pattern = Regex::new(&config.test).map_err(|err| {
            ConfigError::Validation(format!("rule[{index}].test `{}`: {err}", config.test))
        })?;
        Ok(Self {
            index,
            pattern,
            include: config.include.clone(),
            exclude: config.exclude.clone(),
            chain: config.stages.clone(),
        })
    }

    /// Whether the rule applies to the absolute `path`.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        if self.exclude.iter().any(|excluded| path.starts_with(excluded)) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|root| path.starts_with(root)) {
            return false;
        }
        self.pattern.is_match(&slash_relative(root, path))
    }

    /// Whether any stage of this rule decides the module's emission.
    pub fn emitting_stage(&self) -> Option<&TransformSpec> {
        self.chain.iter().find(|stage| stage.declares_emission())
    }
}

/// Every rule, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    root: PathBuf,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn compile(root: &Path, configs: &[RuleConfig]) -> Result<Self, ConfigError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(i, config)| Rule::compile(i, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            root: root.to_path_buf(),
            rules,
        })
    }

    /// All non-excluded matches, in declaration order.
    pub fn matching(&self, path: &Path) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(&self.root, path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    const RULES: &str = r#"
[[rule]]
test = "\\.js$"
include = ["/app/src"]
use = [{ kind = "script" }]

[[rule]]
test = "\\.html$"
use = [{ kind = "html" }]

[[rule]]
test = "\\.html$"
exclude = ["/app/src/index.html"]
use = [{ kind = "file" }]

[[rule]]
test = "(?i)\\.(jpe?g|png)$"
include = ["/app/src"]
use = [{ kind = "url", limit = 10000 }]
"#;

    fn rules() -> RuleSet {
        let config = test_parse_config(RULES);
        RuleSet::compile(Path::new("/app"), &config.rule).unwrap()
    }

    fn indices(set: &RuleSet, path: &str) -> Vec<usize> {
        set.matching(Path::new(path)).iter().map(|r| r.index).collect()
    }

    #[test]
    fn test_all_matches_in_declaration_order() {
        let set = rules();
        assert_eq!(indices(&set, "/app/src/partial.html"), [1, 2]);
        assert_eq!(indices(&set, "/app/src/js/index.js"), [0]);
    }

    #[test]
    fn test_exclude_beats_pattern() {
        let set = rules();
        assert_eq!(indices(&set, "/app/src/index.html"), [1]);
    }

    #[test]
    fn test_include_roots() {
        let set = rules();
        assert!(indices(&set, "/app/node_modules/lib/index.js").is_empty());
        assert_eq!(indices(&set, "/app/src/img/Photo.JPG"), [3]);
    }

    #[test]
    fn test_zero_matches_is_empty() {
        assert!(indices(&rules(), "/app/src/fonts/a.woff2").is_empty());
    }

    #[test]
    fn test_never_returns_excluding_rule() {
        let set = rules();
        for path in ["/app/src/index.html", "/app/src/a.html", "/app/src/x/index.html"] {
            for rule in set.matching(Path::new(path)) {
                assert!(!rule.exclude.iter().any(|e| Path::new(path).starts_with(e)));
            }
        }
    }
}
