use std::path::PathBuf;

use crate::core::ModuleId;
use crate::transform::{Dependency, Emission, ModuleKind, SourceMapFragment};
use crate::utils::hash::ContentHash;

/// A transformed source file.
///
/// Immutable within a pass; a rebuild produces a new value for the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub kind: ModuleKind,
    pub output: Vec<u8>,
    pub source_map: Option<SourceMapFragment>,
    /// As reported by the chain, in source order
    pub dependencies: Vec<Dependency>,
    pub emission: Emission,
    /// Forced chunk from `[[split.force]]`
    pub chunk_affinity: Option<String>,
    /// Hash of source bytes, chain options and mode
    pub fingerprint: ContentHash,
    /// Build tick of the pass that produced this value
    pub discovered_at: u64,
}

impl Module {
    #[inline]
    pub fn size(&self) -> usize {
        self.output.len()
    }

    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}
