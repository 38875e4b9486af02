//! Module identity.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::utils::path::slash_relative;

/// Stable module id: the source path relative to the project root, with
/// forward slashes (`src/js/index.js`).
///
/// Cheap to clone; ordering is plain string ordering so every collection
/// keyed by id iterates deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(Arc<str>);

impl ModuleId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Id for a source file under `root`.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        Self::new(slash_relative(root, path))
    }

    /// Pseudo-id naming an entry point in resolution errors.
    pub fn entry(name: &str) -> Self {
        Self::new(format!("<entry:{name}>"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without directories (`src/js/index.js` → `index.js`).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ModuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
