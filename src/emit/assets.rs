//! Standalone files: `file`/`url` emissions and unmatched references.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::filename::{self, NameParts};
use super::serialize::rewritten_bytes;
use super::{Output, OutputKind};
use crate::core::{BuildSession, ModuleId};
use crate::graph::{Module, ModuleGraph};
use crate::transform::Emission;
use crate::utils::hash::HashBuilder;
use crate::utils::mime;
use crate::utils::path::join_url;

/// Where an emitted asset can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// Output-relative path, query included
    File { path: String, url_path: String },
    DataUri(String),
}

/// Emitted asset locations by module id.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    public_path: String,
    entries: BTreeMap<ModuleId, AssetLocation>,
}

impl AssetTable {
    pub fn new(public_path: &str) -> Self {
        Self {
            public_path: public_path.to_string(),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: ModuleId, location: AssetLocation) {
        self.entries.insert(id, location);
    }

    pub fn get(&self, id: &ModuleId) -> Option<&AssetLocation> {
        self.entries.get(id)
    }

    /// URL of `id` as seen from a file in `from_dir`.
    ///
    /// With a public path every URL is absolute under it. Without one,
    /// `from_dir` makes the URL relative to the referencing file (what
    /// stylesheets need); `None` means relative to the output root, where
    /// the entry document lives.
    pub fn url(&self, id: &ModuleId, from_dir: Option<&str>) -> Option<String> {
        match self.entries.get(id)? {
            AssetLocation::DataUri(uri) => Some(uri.clone()),
            AssetLocation::File { url_path, .. } => Some(if !self.public_path.is_empty() {
                join_url(&self.public_path, url_path)
            } else {
                match from_dir {
                    Some(dir) => relative_url(dir, url_path),
                    None => url_path.clone(),
                }
            }),
        }
    }
}

/// Path from directory `from` to output-relative `to`, both `/`-separated.
pub fn relative_url(from: &str, to: &str) -> String {
    let from: Vec<&str> = from.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to.split('/').collect();
    let common = from
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count()
        .min(to_parts.len().saturating_sub(1));
    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend(&to_parts[common..]);
    parts.join("/")
}

/// Place every module with a standalone emission, then render their bytes.
///
/// Names come from the pre-rewrite bytes, so an asset referencing another
/// asset never waits on it.
pub fn emit(graph: &ModuleGraph, session: &BuildSession) -> (AssetTable, Vec<Output>) {
    let mut table = AssetTable::new(&session.public_path);
    let mut placed: Vec<(&Arc<Module>, String)> = Vec::new();

    for module in graph.modules() {
        let (name, output_path, limit) = match &module.emission {
            Emission::File { name, output_path } => (name, output_path, None),
            Emission::Url {
                name,
                output_path,
                limit,
            } => (name, output_path, *limit),
            Emission::Inline | Emission::Extract => continue,
        };

        if limit.is_some_and(|limit| module.size() < limit) {
            let mime = mime::essence(mime::from_path(&module.path));
            let uri = format!("data:{mime};base64,{}", STANDARD.encode(&module.output));
            table.insert(module.id.clone(), AssetLocation::DataUri(uri));
            continue;
        }

        let (stem, ext) = filename::stem_and_ext(module.id.file_name());
        let hash = HashBuilder::new()
            .part(&module.output)
            .part(module.fingerprint.as_bytes())
            .finish();
        let rendered = filename::render(
            name,
            NameParts {
                name: stem,
                ext,
                hash,
            },
            session.profile.hash_names,
            false,
        );
        let path = join_url(output_path, &rendered.path);
        let url_path = match &rendered.query {
            Some(query) => format!("{path}?{query}"),
            None => path.clone(),
        };
        table.insert(
            module.id.clone(),
            AssetLocation::File {
                path: path.clone(),
                url_path,
            },
        );
        placed.push((module, path));
    }

    let outputs = placed
        .into_iter()
        .map(|(module, path)| {
            let dir = path.rfind('/').map_or("", |i| &path[..i]);
            let bytes = rewritten_bytes(graph, module, &table, Some(dir));
            Output {
                logical: module.id.to_string(),
                path,
                bytes: Arc::from(bytes.into_owned()),
                kind: OutputKind::Asset,
                modules: [module.id.clone()].into(),
            }
        })
        .collect();
    (table, outputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_url() {
        assert_eq!(relative_url("css", "img/logo.png"), "../img/logo.png");
        assert_eq!(relative_url("", "img/logo.png"), "img/logo.png");
        assert_eq!(relative_url("a/b", "a/c/x.png"), "../c/x.png");
        assert_eq!(relative_url("img", "img/x.png"), "x.png");
    }

    #[test]
    fn test_url_with_public_path() {
        let mut table = AssetTable::new("/assets/");
        table.insert(
            ModuleId::new("src/img/a.png"),
            AssetLocation::File {
                path: "img/a.png".into(),
                url_path: "img/a.png?abc".into(),
            },
        );
        let id = ModuleId::new("src/img/a.png");
        assert_eq!(table.url(&id, Some("css")).unwrap(), "/assets/img/a.png?abc");

        let mut relative = AssetTable::new("");
        relative.insert(id.clone(), table.get(&id).unwrap().clone());
        assert_eq!(relative.url(&id, Some("css")).unwrap(), "../img/a.png?abc");
        assert_eq!(relative.url(&id, None).unwrap(), "img/a.png?abc");
    }
}
