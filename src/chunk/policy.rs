use regex::Regex;

use crate::config::{ConfigError, SplitSection};
use crate::core::ModuleId;

/// A `[[split.force]]` entry.
#[derive(Debug, Clone)]
pub struct ForcedChunk {
    pub pattern: Regex,
    pub name: String,
}

/// Compiled `[split]` section.
#[derive(Debug, Clone, Default)]
pub struct SplitPolicy {
    /// Name of the shared chunk; `None` disables commons extraction
    pub commons: Option<String>,
    pub max_chunks: Option<usize>,
    /// Bytes
    pub min_chunk_size: Option<usize>,
    pub force: Vec<ForcedChunk>,
}

impl SplitPolicy {
    pub fn from_config(section: &SplitSection) -> Result<Self, ConfigError> {
        let force = section
            .force
            .iter()
            .enumerate()
            .map(|(i, force)| {
                Regex::new(&force.test)
                    .map(|pattern| ForcedChunk {
                        pattern,
                        name: force.name.clone(),
                    })
                    .map_err(|err| {
                        ConfigError::Validation(format!("split.force[{i}].test `{}`: {err}", force.test))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            commons: section.commons.clone(),
            max_chunks: section.max_chunks,
            min_chunk_size: section.min_chunk_size,
            force,
        })
    }

    /// Chunk a module is forced into, first matching pattern wins.
    pub fn affinity_for(&self, id: &ModuleId) -> Option<String> {
        self.force
            .iter()
            .find(|forced| forced.pattern.is_match(id.as_str()))
            .map(|forced| forced.name.clone())
    }

    /// Forced chunk names, in first-declared order.
    pub fn forced_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for forced in &self.force {
            if !names.contains(&forced.name.as_str()) {
                names.push(&forced.name);
            }
        }
        names
    }
}
