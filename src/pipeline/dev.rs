//! Incremental passes for `weft serve`.
//!
//! A `DevSession` owns the last good graph and rendered output. Each
//! rebuild re-transforms only dirty files, re-renders, writes what changed
//! and turns the difference into patches for connected clients.
//!
//! A rejected pass changes nothing on disk and leaves the published
//! manifest in place; its dirty files stay pending for the next pass.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{assemble, report_ambiguities};
use crate::core::{BuildError, BuildSession, ModuleId};
use crate::emit::{self, EmitScope, ManifestStore, OutputKind, Rendered};
use crate::graph::{GraphBuilder, ModuleGraph};
use crate::hmr::{HotReloadMessage, PatchSink};
use crate::transform::Emission;
use crate::utils::path::join_url;
use crate::debug;

/// Result of one dev pass.
#[derive(Debug)]
pub enum RebuildOutcome {
    /// Output committed
    Applied {
        /// Modules transformed in this pass
        transformed: usize,
        /// Manifest names written
        written: Vec<String>,
        /// Messages sent to clients
        patches: usize,
        /// Transform errors absorbed by keeping the previous module
        recovered: Vec<BuildError>,
        elapsed: Duration,
    },
    /// None of the changed files takes part in the build
    Unchanged,
    /// Pass rejected; the previous output stays
    Failed(Vec<BuildError>),
}

pub struct DevSession {
    session: BuildSession,
    sink: Arc<dyn PatchSink>,
    manifests: Arc<ManifestStore>,
    tick: u64,
    graph: ModuleGraph,
    rendered: Option<Rendered>,
    /// Changed since the last committed pass
    pending: BTreeSet<PathBuf>,
    healthy: bool,
    showing_error: bool,
}

impl DevSession {
    pub fn new(session: BuildSession, sink: Arc<dyn PatchSink>) -> Self {
        Self {
            session,
            sink,
            manifests: Arc::new(ManifestStore::new()),
            tick: 0,
            graph: ModuleGraph::new(),
            rendered: None,
            pending: BTreeSet::new(),
            healthy: false,
            showing_error: false,
        }
    }

    pub fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Manifest of the last committed pass.
    pub fn manifests(&self) -> Arc<ManifestStore> {
        Arc::clone(&self.manifests)
    }

    pub fn rendered(&self) -> Option<&Rendered> {
        self.rendered.as_ref()
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    /// Full pass over every entry.
    pub fn initial_build(&mut self) -> RebuildOutcome {
        self.pass()
    }

    /// Pass after `changed` files were edited, created or removed.
    pub fn rebuild(&mut self, changed: &[PathBuf]) -> RebuildOutcome {
        if self.healthy && !changed.iter().any(|path| self.is_relevant(path)) {
            debug!("watch"; "no tracked file changed");
            return RebuildOutcome::Unchanged;
        }
        self.pending.extend(changed.iter().cloned());
        self.pass()
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if self.graph.modules().any(|m| m.path == path) {
            return true;
        }
        self.session
            .html
            .as_ref()
            .is_some_and(|html| html.template == path || html.favicon.as_deref() == Some(path))
    }

    fn pass(&mut self) -> RebuildOutcome {
        let started = Instant::now();
        self.tick += 1;

        let builder = GraphBuilder::new(&self.session, self.tick);
        let outcome = match &self.rendered {
            Some(_) => builder.rebuild(&self.graph, &self.pending),
            None => builder.build(),
        };
        report_ambiguities(&outcome.ambiguities);
        if !outcome.is_ok() {
            return self.reject(outcome.errors);
        }

        let rendered = match assemble(&outcome.graph, &self.session) {
            Ok(rendered) => rendered,
            Err(err) => return self.reject(vec![err]),
        };

        let scope = EmitScope::Changed(outcome.transformed.clone());
        let written = match emit::commit(&rendered, self.rendered.as_ref(), &scope, &self.session) {
            Ok(written) => written,
            Err(err) => return self.reject(vec![err.into()]),
        };
        self.manifests.publish(rendered.manifest.clone());

        let mut messages = match &self.rendered {
            Some(previous) => patches(&self.session, &self.graph, previous, &outcome.graph, &rendered),
            None => vec![HotReloadMessage::reload("initial build")],
        };
        if let Some(first) = outcome.recovered.first() {
            messages.push(HotReloadMessage::error(first.subject(), first.to_string()));
            self.showing_error = true;
        } else if self.showing_error {
            messages.push(HotReloadMessage::ClearError);
            self.showing_error = false;
        }
        let sent = messages.len();
        for message in messages {
            self.sink.send(message);
        }

        self.graph = outcome.graph;
        self.rendered = Some(rendered);
        self.pending.clear();
        self.healthy = true;

        RebuildOutcome::Applied {
            transformed: outcome.transformed.len(),
            written,
            patches: sent,
            recovered: outcome.recovered,
            elapsed: started.elapsed(),
        }
    }

    fn reject(&mut self, errors: Vec<BuildError>) -> RebuildOutcome {
        if let Some(first) = errors.first() {
            self.sink.send(HotReloadMessage::error(first.subject(), first.to_string()));
            self.showing_error = true;
        }
        self.healthy = false;
        RebuildOutcome::Failed(errors)
    }
}

// ============================================================================
// patches
// ============================================================================

/// Messages that bring a client showing `previous` up to `rendered`.
///
/// A different chunk layout, entry document or standalone file needs a
/// full reload. Otherwise every module whose factory text changed is
/// re-sent (dependencies first) and every changed stylesheet is swapped.
fn patches(
    session: &BuildSession,
    old_graph: &ModuleGraph,
    previous: &Rendered,
    graph: &ModuleGraph,
    rendered: &Rendered,
) -> Vec<HotReloadMessage> {
    if layout(previous) != layout(rendered) {
        return vec![HotReloadMessage::reload("chunk layout changed")];
    }

    let changed = move |kind: OutputKind| {
        rendered.outputs.iter().filter(move |o| o.kind == kind).filter(move |output| {
            previous
                .output(&output.logical)
                .is_none_or(|old| old.path != output.path || old.bytes != output.bytes)
        })
    };
    if let Some(output) = changed(OutputKind::Document).chain(changed(OutputKind::Asset)).next() {
        return vec![HotReloadMessage::reload(format!("{} changed", output.logical))];
    }

    let mut messages = Vec::new();
    for id in graph.global_order() {
        let Some(module) = graph.module(&id) else { continue };
        if matches!(module.emission, Emission::Extract) || !in_chunk(rendered, &id) {
            continue;
        }
        let code = emit::define(graph, module, &rendered.assets).text;
        let before = old_graph
            .module(&id)
            .map(|old| emit::define(old_graph, old, &previous.assets).text);
        if before.as_deref() != Some(code.as_str()) {
            messages.push(HotReloadMessage::Update {
                module_id: id.to_string(),
                code,
                source_map: None,
            });
        }
    }

    for output in changed(OutputKind::Stylesheet) {
        messages.push(HotReloadMessage::Css {
            href: join_url(&session.public_path, &output.path),
            content: String::from_utf8_lossy(&output.bytes).into_owned(),
        });
    }
    messages
}

/// Chunk name → member modules.
fn layout(rendered: &Rendered) -> BTreeMap<&str, &[ModuleId]> {
    rendered
        .chunks
        .iter()
        .map(|chunk| (chunk.name.as_str(), chunk.modules.as_slice()))
        .collect()
}

fn in_chunk(rendered: &Rendered, id: &ModuleId) -> bool {
    rendered.containing(id).any(|o| o.kind == OutputKind::Chunk)
}
