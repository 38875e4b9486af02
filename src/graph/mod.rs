//! Module graph.
//!
//! # Module Structure
//!
//! ```text
//! graph/
//! ├── module.rs    # Module value
//! ├── resolve.rs   # Reference → file resolution
//! ├── builder.rs   # Parallel discovery and transformation
//! └── mod.rs       # ModuleGraph (this file)
//! ```
//!
//! Every map is ordered by module id, so iteration never depends on hashing
//! or on which worker finished first.

mod builder;
mod module;
mod resolve;

pub use builder::GraphBuilder;
pub use module::Module;
pub use resolve::{ResolveOptions, Resolver};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::ModuleId;
use crate::transform::DependencyKind;

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Reference as written in the source
    pub raw: String,
    /// Specifier the module's code asks the runtime for
    pub specifier: String,
    pub target: ModuleId,
    pub kind: DependencyKind,
}

/// Directed graph over module ids. Cycles are allowed.
///
/// Forward edges keep each module's dependency order; reverse edges answer
/// "who imports this" for rebuilds.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: BTreeMap<ModuleId, Arc<Module>>,
    forward: BTreeMap<ModuleId, Vec<Edge>>,
    reverse: BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    /// Entry name → root modules, in declaration order
    entries: Vec<(String, Vec<ModuleId>)>,
    /// Entry document template, when rules transform it
    document: Option<ModuleId>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module with its resolved edges, replacing any previous value.
    pub fn insert(&mut self, module: Arc<Module>, edges: Vec<Edge>) {
        let id = module.id.clone();
        self.remove_edges(&id);
        for edge in &edges {
            if edge.target != id {
                self.reverse
                    .entry(edge.target.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
        self.forward.insert(id.clone(), edges);
        self.modules.insert(id, module);
    }

    pub fn add_entry(&mut self, name: impl Into<String>, roots: Vec<ModuleId>) {
        self.entries.push((name.into(), roots));
    }

    pub fn set_document(&mut self, id: ModuleId) {
        self.document = Some(id);
    }

    /// The transformed entry document template, if it is in the graph.
    pub fn document(&self) -> Option<&Arc<Module>> {
        self.document.as_ref().and_then(|id| self.modules.get(id))
    }

    #[inline]
    pub fn module(&self, id: &ModuleId) -> Option<&Arc<Module>> {
        self.modules.get(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<Module>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn edges(&self, id: &ModuleId) -> &[Edge] {
        self.forward.get(id).map_or(&[], Vec::as_slice)
    }

    pub fn importers(&self, id: &ModuleId) -> impl Iterator<Item = &ModuleId> {
        self.reverse.get(id).into_iter().flatten()
    }

    pub fn entries(&self) -> &[(String, Vec<ModuleId>)] {
        &self.entries
    }

    pub fn entry_roots(&self) -> BTreeSet<&ModuleId> {
        self.entries.iter().flat_map(|(_, roots)| roots).collect()
    }

    /// Modules reachable from `roots`, dependencies before dependents.
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a ModuleId>) -> Vec<ModuleId> {
        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        for root in roots {
            self.post_order(root, &mut visited, &mut order);
        }
        order
    }

    /// Every module reachable from any entry, in entry declaration order,
    /// dependencies first.
    pub fn global_order(&self) -> Vec<ModuleId> {
        let roots: Vec<&ModuleId> = self.entries.iter().flat_map(|(_, roots)| roots).collect();
        self.reachable_from(roots)
    }

    /// Iterative post-order DFS; a module already on the path is skipped so
    /// cycles terminate.
    fn post_order(&self, root: &ModuleId, visited: &mut BTreeSet<ModuleId>, order: &mut Vec<ModuleId>) {
        if !self.modules.contains_key(root) || !visited.insert(root.clone()) {
            return;
        }
        let mut stack: Vec<(ModuleId, usize)> = vec![(root.clone(), 0)];
        while let Some((id, next)) = stack.pop() {
            let edges = self.edges(&id);
            if let Some(edge) = edges.get(next) {
                stack.push((id, next + 1));
                if self.modules.contains_key(&edge.target) && visited.insert(edge.target.clone()) {
                    stack.push((edge.target.clone(), 0));
                }
            } else {
                order.push(id);
            }
        }
    }

    fn remove_edges(&mut self, id: &ModuleId) {
        let Some(old) = self.forward.remove(id) else {
            return;
        };
        for edge in old {
            if let Some(importers) = self.reverse.get_mut(&edge.target) {
                importers.remove(id);
                if importers.is_empty() {
                    self.reverse.remove(&edge.target);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transform::{Emission, ModuleKind};
    use crate::utils::hash::ContentHash;
    use std::path::PathBuf;

    pub(crate) fn module(id: &str, size: usize) -> Arc<Module> {
        Arc::new(Module {
            id: ModuleId::new(id),
            path: PathBuf::from(format!("/p/{id}")),
            kind: ModuleKind::Script,
            output: vec![b'x'; size],
            source_map: None,
            dependencies: Vec::new(),
            emission: Emission::Inline,
            chunk_affinity: None,
            fingerprint: ContentHash::of(id),
            discovered_at: 0,
        })
    }

    pub(crate) fn edge(target: &str) -> Edge {
        Edge {
            raw: format!("./{target}"),
            specifier: format!("./{target}"),
            target: ModuleId::new(target),
            kind: DependencyKind::Import,
        }
    }

    /// Graph from `(id, size, deps)` triples and `(entry, root)` pairs.
    pub(crate) fn graph(modules: &[(&str, usize, &[&str])], entries: &[(&str, &str)]) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        for &(id, size, deps) in modules {
            graph.insert(module(id, size), deps.iter().map(|d| edge(d)).collect());
        }
        for &(name, root) in entries {
            graph.add_entry(name, vec![ModuleId::new(root)]);
        }
        graph
    }

    fn ids(list: &[ModuleId]) -> Vec<&str> {
        list.iter().map(ModuleId::as_str).collect()
    }

    #[test]
    fn test_post_order_dependencies_first() {
        let g = graph(
            &[("a.js", 1, &["b.js", "c.js"]), ("b.js", 1, &["c.js"]), ("c.js", 1, &[])],
            &[("main", "a.js")],
        );
        assert_eq!(ids(&g.global_order()), ["c.js", "b.js", "a.js"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let g = graph(&[("a.js", 1, &["b.js"]), ("b.js", 1, &["a.js"])], &[("main", "a.js")]);
        assert_eq!(ids(&g.global_order()), ["b.js", "a.js"]);
        assert_eq!(g.importers(&ModuleId::new("a.js")).count(), 1);
    }

    #[test]
    fn test_reinsert_replaces_reverse_edges() {
        let mut g = graph(&[("a.js", 1, &["b.js"]), ("b.js", 1, &[])], &[("main", "a.js")]);
        assert_eq!(g.importers(&ModuleId::new("b.js")).count(), 1);
        g.insert(module("a.js", 1), Vec::new());
        assert_eq!(g.importers(&ModuleId::new("b.js")).count(), 0);
    }
}
