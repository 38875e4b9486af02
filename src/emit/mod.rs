//! Asset emission.
//!
//! # Module Structure
//!
//! ```text
//! emit/
//! ├── assets.rs      # file/url emissions, data URIs, URL lookup
//! ├── filename.rs    # [name]/[ext]/[hash] templates
//! ├── manifest.rs    # Manifest and the published-manifest store
//! ├── minify.rs      # oxc / lightningcss
//! ├── serialize.rs   # module factories and chunk code
//! ├── sourcemap.rs   # line maps for script chunks
//! ├── write.rs       # write phase
//! └── mod.rs         # render + commit (this file)
//! ```
//!
//! Emission is two steps. [`render`] builds every output in memory and the
//! manifest that names them; nothing touches the disk. [`commit`] writes a
//! rendered set (all of it, or what changed since the last one) and
//! persists the manifest last.

mod assets;
mod filename;
mod manifest;
mod minify;
mod serialize;
mod sourcemap;
mod write;

pub use assets::AssetTable;
pub use filename::NameParts;
pub use manifest::{Manifest, ManifestStore};
pub use serialize::{define, rewritten_bytes};

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::chunk::Chunk;
use crate::core::{BuildError, BuildSession, EmissionError, ModuleId};
use crate::graph::{Module, ModuleGraph};
use crate::transform::Emission;
use crate::utils::hash::{ContentHash, HashBuilder};
use crate::{debug, html};
use write::WritePlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Chunk,
    SourceMap,
    Stylesheet,
    Asset,
    Document,
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Manifest key
    pub logical: String,
    /// Output-relative path, `/`-separated
    pub path: String,
    pub bytes: Arc<[u8]>,
    pub kind: OutputKind,
    /// Modules whose bytes went into this output
    pub modules: BTreeSet<ModuleId>,
}

/// Everything a pass would write.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub outputs: Vec<Output>,
    pub manifest: Manifest,
    pub chunks: Vec<Chunk>,
    pub assets: AssetTable,
    /// Chunk manifest names in load order
    pub scripts: Vec<String>,
    /// Stylesheet manifest names in link order
    pub stylesheets: Vec<String>,
    /// Digest over every output
    pub build_hash: ContentHash,
}

impl Rendered {
    pub fn output(&self, logical: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.logical == logical)
    }

    /// Outputs that contain `id`.
    pub fn containing<'a>(&'a self, id: &'a ModuleId) -> impl Iterator<Item = &'a Output> + 'a {
        self.outputs.iter().filter(move |o| o.modules.contains(id))
    }
}

/// Render chunks, stylesheets, assets and the entry document.
pub fn render(graph: &ModuleGraph, chunks: Vec<Chunk>, session: &BuildSession) -> Result<Rendered, BuildError> {
    let profile = session.profile;
    let (assets, mut outputs) = assets::emit(graph, session);

    let mut scripts = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let logical = format!("{}.js", chunk.name);
        let (mut code, map) = serialize::chunk_code(graph, chunk, &assets, profile.source_maps);
        if profile.minify {
            code = minify::minify_js(&logical, &code);
        }

        let hash = fingerprinted(code.as_bytes(), chunk.modules.iter().filter_map(|id| graph.module(id)));
        let name = filename::render(
            &session.output.filename,
            NameParts {
                name: &chunk.name,
                ext: "js",
                hash,
            },
            profile.hash_names,
            true,
        );

        if let Some(map) = map {
            let map_path = format!("{}.map", name.path);
            let map_file = map_path.rsplit('/').next().unwrap_or(&map_path).to_string();
            let chunk_file = name.path.rsplit('/').next().unwrap_or(&name.path);
            code.push_str(&format!("//# sourceMappingURL={map_file}\n"));
            outputs.push(Output {
                logical: format!("{logical}.map"),
                path: map_path,
                bytes: Arc::from(map.build(chunk_file).to_json().into_bytes()),
                kind: OutputKind::SourceMap,
                modules: BTreeSet::new(),
            });
        }

        outputs.push(Output {
            logical: logical.clone(),
            path: name.path,
            bytes: Arc::from(code.into_bytes()),
            kind: OutputKind::Chunk,
            modules: chunk.modules.iter().cloned().collect(),
        });
        scripts.push(logical);
    }

    let mut stylesheets = Vec::new();
    for (name, members) in stylesheet_groups(graph, &chunks, session) {
        let output = stylesheet(graph, &name, &members, &assets, session);
        stylesheets.push(output.logical.clone());
        outputs.push(output);
    }

    let mut manifest = Manifest::new();
    for output in &outputs {
        manifest.insert(&output.logical, &output.path)?;
    }

    let build_hash = outputs
        .iter()
        .fold(HashBuilder::new(), |hasher, o| hasher.part(&o.path).part(&o.bytes))
        .finish();

    if let Some(section) = &session.html {
        let inputs = html::DocumentInputs {
            graph,
            assets: &assets,
            manifest: &manifest,
            scripts: &scripts,
            stylesheets: &stylesheets,
            build_hash,
        };
        for output in html::render(session, section, &inputs)? {
            manifest.insert(&output.logical, &output.path)?;
            outputs.push(output);
        }
    }

    debug!("emit"; "{} outputs, build {}", outputs.len(), build_hash.short(8));
    Ok(Rendered {
        outputs,
        manifest,
        chunks,
        assets,
        scripts,
        stylesheets,
        build_hash,
    })
}

/// Final bytes plus member fingerprints, so option changes that leave the
/// bytes alone still move the hash.
fn fingerprinted<'a>(bytes: &[u8], modules: impl Iterator<Item = &'a Arc<Module>>) -> ContentHash {
    modules
        .fold(HashBuilder::new().part(bytes), |hasher, module| {
            hasher.part(module.fingerprint.as_bytes())
        })
        .finish()
}

/// Extracted style modules grouped into stylesheets: one for the whole
/// build, or one per chunk.
fn stylesheet_groups<'g>(
    graph: &'g ModuleGraph,
    chunks: &[Chunk],
    session: &BuildSession,
) -> Vec<(String, Vec<&'g Arc<Module>>)> {
    let extracted = |ids: &mut dyn Iterator<Item = &ModuleId>| -> Vec<&'g Arc<Module>> {
        ids.filter_map(|id| graph.module(id))
            .filter(|m| m.emission == Emission::Extract)
            .collect()
    };

    let groups = if session.extract.all_chunks {
        let order = graph.global_order();
        vec![(session.extract.name.clone(), extracted(&mut order.iter()))]
    } else {
        chunks
            .iter()
            .map(|chunk| (chunk.name.clone(), extracted(&mut chunk.modules.iter())))
            .collect()
    };
    groups.into_iter().filter(|(_, members)| !members.is_empty()).collect()
}

fn stylesheet(
    graph: &ModuleGraph,
    name: &str,
    members: &[&Arc<Module>],
    assets: &AssetTable,
    session: &BuildSession,
) -> Output {
    let dir = filename::directory(&session.extract.filename, name);
    let logical = format!("{name}.css");

    let mut css = String::new();
    for module in members {
        let bytes = serialize::rewritten_bytes(graph, module, assets, Some(&dir));
        css.push_str(&String::from_utf8_lossy(&bytes));
        if !css.ends_with('\n') {
            css.push('\n');
        }
    }
    if session.profile.minify {
        css = minify::minify_css(&logical, &css);
    }

    let hash = fingerprinted(css.as_bytes(), members.iter().copied());
    let rendered = filename::render(
        &session.extract.filename,
        NameParts {
            name,
            ext: "css",
            hash,
        },
        session.profile.hash_names,
        true,
    );
    Output {
        logical,
        path: rendered.path,
        bytes: Arc::from(css.into_bytes()),
        kind: OutputKind::Stylesheet,
        modules: members.iter().map(|m| m.id.clone()).collect(),
    }
}

// ============================================================================
// commit
// ============================================================================

/// Which outputs a commit writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitScope {
    /// Reset the output directory and write everything
    Full,
    /// Write outputs containing these modules, plus outputs that are new,
    /// moved or whose bytes changed since the previous commit
    Changed(BTreeSet<ModuleId>),
}

/// Write `rendered` and persist its manifest. Returns the manifest names
/// written.
pub fn commit(
    rendered: &Rendered,
    previous: Option<&Rendered>,
    scope: &EmitScope,
    session: &BuildSession,
) -> Result<Vec<String>, EmissionError> {
    let selected: Vec<&Output> = match (scope, previous) {
        (EmitScope::Changed(changed), Some(previous)) => rendered
            .outputs
            .iter()
            .filter(|output| {
                output.modules.iter().any(|id| changed.contains(id))
                    || previous.output(&output.logical).is_none_or(|old| {
                        old.path != output.path || old.bytes != output.bytes
                    })
            })
            .collect(),
        _ => rendered.outputs.iter().collect(),
    };

    let remove = match (scope, previous) {
        (EmitScope::Changed(_), Some(previous)) => previous
            .outputs
            .iter()
            .filter(|old| !rendered.outputs.iter().any(|o| o.path == old.path))
            .map(|old| old.path.clone())
            .collect(),
        _ => Vec::new(),
    };

    let plan = WritePlan {
        output_dir: session.output_dir.clone(),
        reset: matches!(scope, EmitScope::Full) || previous.is_none(),
        files: selected
            .iter()
            .map(|o| (o.path.clone(), Arc::clone(&o.bytes)))
            .collect(),
        remove,
        manifest: Some((session.output.manifest.clone(), rendered.manifest.to_json())),
    };
    plan.execute(session.timeout)?;

    Ok(selected.into_iter().map(|o| o.logical.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{SplitPolicy, split};
    use crate::config::test_project_config;
    use crate::core::BuildMode;
    use crate::graph::tests::graph;
    use std::fs;
    use tempfile::TempDir;

    fn session(mode: BuildMode) -> (TempDir, BuildSession) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        let config = test_project_config(
            dir.path(),
            "[[entry]]\nname = \"main\"\nimport = \"./a.js\"\n[output]\nfilename = \"js/[name].js\"",
        );
        let session = BuildSession::new(&config, mode).unwrap();
        (dir, session)
    }

    fn sample() -> ModuleGraph {
        graph(&[("a.js", 4, &["b.js"]), ("b.js", 4, &[])], &[("main", "a.js")])
    }

    #[test]
    fn test_dev_render_has_stable_names_and_maps() {
        let (_dir, session) = session(BuildMode::Development);
        let g = sample();
        let rendered = render(&g, split(&g, &SplitPolicy::default()), &session).unwrap();
        assert_eq!(rendered.manifest.get("main.js"), Some("js/main.js"));
        assert_eq!(rendered.manifest.get("main.js.map"), Some("js/main.js.map"));
        let chunk = rendered.output("main.js").unwrap();
        assert!(std::str::from_utf8(&chunk.bytes).unwrap().ends_with("//# sourceMappingURL=main.js.map\n"));
        assert_eq!(rendered.scripts, ["main.js"]);
    }

    #[test]
    fn test_prod_render_is_hashed_and_reproducible() {
        let (_dir, session) = session(BuildMode::Production);
        let g = sample();
        let first = render(&g, split(&g, &SplitPolicy::default()), &session).unwrap();
        let second = render(&g, split(&g, &SplitPolicy::default()), &session).unwrap();
        let path = first.manifest.get("main.js").unwrap();
        assert!(path.starts_with("js/main.") && path.ends_with(".js") && path.len() == "js/main..js".len() + 8);
        assert!(first.manifest.get("main.js.map").is_none());
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.build_hash, second.build_hash);
    }

    #[test]
    fn test_commit_changed_scope() {
        let (_dir, session) = session(BuildMode::Development);
        let g = graph(
            &[("a.js", 4, &[]), ("b.js", 4, &[])],
            &[("main", "a.js"), ("other", "b.js")],
        );
        let first = render(&g, split(&g, &SplitPolicy::default()), &session).unwrap();
        let written = commit(&first, None, &EmitScope::Full, &session).unwrap();
        assert_eq!(written.len(), first.outputs.len());

        let changed: BTreeSet<ModuleId> = [ModuleId::new("b.js")].into();
        let written = commit(&first, Some(&first), &EmitScope::Changed(changed), &session).unwrap();
        assert_eq!(written, ["other.js"]);
        assert!(session.output_dir.join("manifest.json").is_file());
    }
}
