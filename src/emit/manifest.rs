//! Logical name → physical output path.
//!
//! Append-only while a pass renders; a rebuild produces a new manifest that
//! replaces the published one wholesale.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::ManifestConsistencyError;

/// Serialized as the plain `logical → physical` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct Manifest {
    entries: BTreeMap<String, String>,
    /// Physical path → logical name
    by_path: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `logical → physical`. Two names claiming one physical path
    /// is an error; re-inserting the same pair is not.
    pub fn insert(
        &mut self,
        logical: impl Into<String>,
        physical: impl Into<String>,
    ) -> Result<(), ManifestConsistencyError> {
        let logical = logical.into();
        let physical = physical.into();
        if let Some(first) = self.by_path.get(&physical)
            && *first != logical
        {
            return Err(ManifestConsistencyError::DuplicatePath {
                path: physical,
                first: first.clone(),
                second: logical,
            });
        }
        if let Some(old) = self.entries.insert(logical.clone(), physical.clone()) {
            self.by_path.remove(&old);
        }
        self.by_path.insert(physical, logical);
        Ok(())
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.entries.get(logical).map(String::as_str)
    }

    /// Like [`get`](Self::get), failing with the missing name.
    pub fn require(&self, logical: &str) -> Result<&str, ManifestConsistencyError> {
        self.get(logical)
            .ok_or_else(|| ManifestConsistencyError::MissingName(logical.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted-key JSON, as persisted next to the outputs.
    pub fn to_json(&self) -> String {
        let mut json = serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into());
        json.push('\n');
        json
    }
}

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl TryFrom<BTreeMap<String, String>> for Manifest {
    type Error = ManifestConsistencyError;

    fn try_from(entries: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut manifest = Self::new();
        for (logical, physical) in entries {
            manifest.insert(logical, physical)?;
        }
        Ok(manifest)
    }
}

/// The last successfully published manifest.
pub struct ManifestStore {
    current: ArcSwap<Manifest>,
}

impl ManifestStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Manifest::new()),
        }
    }

    #[inline]
    pub fn load(&self) -> Arc<Manifest> {
        self.current.load_full()
    }

    pub fn publish(&self, manifest: Manifest) {
        self.current.store(Arc::new(manifest));
    }
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_physical_path() {
        let mut manifest = Manifest::new();
        manifest.insert("main.js", "js/main.js").unwrap();
        manifest.insert("main.js", "js/main.js").unwrap();
        let err = manifest.insert("other.js", "js/main.js").unwrap_err();
        assert_eq!(
            err,
            ManifestConsistencyError::DuplicatePath {
                path: "js/main.js".into(),
                first: "main.js".into(),
                second: "other.js".into(),
            }
        );
    }

    #[test]
    fn test_json_is_sorted() {
        let mut manifest = Manifest::new();
        manifest.insert("styles.css", "css/styles.css").unwrap();
        manifest.insert("main.js", "js/main.js").unwrap();
        let json = manifest.to_json();
        assert!(json.find("main.js").unwrap() < json.find("styles.css").unwrap());
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_moved_name_frees_its_old_path() {
        let mut manifest = Manifest::new();
        manifest.insert("main.js", "main.1111.js").unwrap();
        manifest.insert("main.js", "main.2222.js").unwrap();
        manifest.insert("legacy.js", "main.1111.js").unwrap();
        assert_eq!(manifest.get("main.js"), Some("main.2222.js"));

        let err = serde_json::from_str::<Manifest>(r#"{"a.js": "x.js", "b.js": "x.js"}"#).unwrap_err();
        assert!(err.to_string().contains("x.js"), "{err}");
    }

    #[test]
    fn test_require_missing() {
        let manifest = Manifest::new();
        assert_eq!(
            manifest.require("main.js"),
            Err(ManifestConsistencyError::MissingName("main.js".into()))
        );
    }

    #[test]
    fn test_store_replaces_wholesale() {
        let store = ManifestStore::new();
        let mut first = Manifest::new();
        first.insert("a.js", "a.js").unwrap();
        store.publish(first);
        let held = store.load();

        let mut second = Manifest::new();
        second.insert("b.js", "b.js").unwrap();
        store.publish(second);

        assert_eq!(held.get("a.js"), Some("a.js"));
        assert_eq!(store.load().get("a.js"), None);
        assert_eq!(store.load().len(), 1);
    }
}
