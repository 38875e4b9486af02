//! The immutable build session.
//!
//! Built once from the validated [`BundleConfig`] and the mode, then passed
//! by reference into every phase. No phase reads configuration any other
//! way.

use std::path::PathBuf;
use std::time::Duration;

use super::{BuildMode, ModeProfile, ScriptConstants};
use crate::chunk::SplitPolicy;
use crate::config::{BundleConfig, ConfigError, ExtractSection, HtmlSection, OutputSection};
use crate::graph::ResolveOptions;
use crate::rule::{Rule, RuleSet};
use crate::transform::TransformSpec;

/// A declared entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    pub name: String,
    /// Resolved from the source root, in declared order
    pub specifiers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildSession {
    pub root: PathBuf,
    /// Source root; entries resolve against it
    pub context: PathBuf,
    pub output_dir: PathBuf,
    pub public_path: String,
    pub output: OutputSection,
    pub extract: ExtractSection,
    pub mode: BuildMode,
    pub profile: ModeProfile,
    pub entries: Vec<EntrySpec>,
    pub rules: RuleSet,
    pub resolve: ResolveOptions,
    pub split: SplitPolicy,
    pub constants: ScriptConstants,
    pub html: Option<HtmlSection>,
    /// Per transform chain, and for the whole write phase
    pub timeout: Duration,
    pub workers: Option<usize>,
}

impl BuildSession {
    pub fn new(config: &BundleConfig, mode: BuildMode) -> Result<Self, ConfigError> {
        let defines = config
            .define
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(config.env.capture());

        Ok(Self {
            root: config.root.clone(),
            context: config.build.context.clone(),
            output_dir: config.build.output.clone(),
            public_path: config.build.public_path.clone(),
            output: config.output.clone(),
            extract: config.extract.clone(),
            mode,
            profile: mode.profile(),
            entries: config
                .entry
                .iter()
                .map(|entry| EntrySpec {
                    name: entry.name.clone(),
                    specifiers: entry
                        .import
                        .specifiers()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
            rules: RuleSet::compile(&config.root, &config.rule)?,
            resolve: ResolveOptions::from_config(&config.resolve),
            split: SplitPolicy::from_config(&config.split)?,
            constants: ScriptConstants::for_mode(mode, defines, config.provide.clone()),
            html: config.html.clone(),
            timeout: Duration::from_millis(config.build.timeout_ms),
            workers: config.build.workers,
        })
    }

    /// The combined chain for a file matched by `rules`: every rule's stages
    /// in rule order, plus the session's constant stages for script chains.
    pub fn chain_for(&self, rules: &[&Rule]) -> Vec<TransformSpec> {
        let mut chain: Vec<TransformSpec> = rules
            .iter()
            .flat_map(|rule| rule.chain.iter().cloned())
            .collect();
        self.constants.augment(&mut chain);
        chain
    }

    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}
