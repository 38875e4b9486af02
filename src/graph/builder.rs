//! Parallel graph discovery.
//!
//! Each discovered file is claimed once per pass, transformed on a rayon
//! worker, and its references resolved; every newly resolved file is
//! spawned into the same scope. A reference to a file another worker is
//! still transforming is linked by id, so cycles need no special casing.

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Edge, Module, ModuleGraph, Resolver};
use crate::core::{BuildError, BuildSession, ModuleId, ResolutionError, RuleMatchAmbiguity};
use crate::logger::ProgressLine;
use crate::transform::Executor;
use crate::{debug, log};

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub graph: ModuleGraph,
    /// Errors that reject the pass
    pub errors: Vec<BuildError>,
    /// Transform errors absorbed by keeping the previous module
    pub recovered: Vec<BuildError>,
    pub ambiguities: Vec<RuleMatchAmbiguity>,
    /// Modules kept from the previous pass after a failed transform
    pub stale: BTreeSet<ModuleId>,
    /// Modules transformed in this pass rather than reused
    pub transformed: BTreeSet<ModuleId>,
}

impl BuildOutcome {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct GraphBuilder<'s> {
    session: &'s BuildSession,
    tick: u64,
    progress: bool,
}

impl<'s> GraphBuilder<'s> {
    pub fn new(session: &'s BuildSession, tick: u64) -> Self {
        Self {
            session,
            tick,
            progress: false,
        }
    }

    /// Show a module counter while transforming.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Discover and transform everything reachable from the entries.
    pub fn build(&self) -> BuildOutcome {
        self.run(None)
    }

    /// Like [`build`](Self::build), but modules of `previous` whose file is
    /// not in `dirty` are reused as-is.
    pub fn rebuild(&self, previous: &ModuleGraph, dirty: &BTreeSet<PathBuf>) -> BuildOutcome {
        self.run(Some((previous, dirty)))
    }

    fn run(&self, previous: Option<(&ModuleGraph, &BTreeSet<PathBuf>)>) -> BuildOutcome {
        let session = self.session;
        let pass = Pass {
            session,
            executor: Executor::new(session),
            resolver: Resolver::new(session.resolve.clone()),
            previous,
            tick: self.tick,
            claimed: DashSet::new(),
            done: DashMap::new(),
            errors: Mutex::new(Vec::new()),
            recovered: Mutex::new(Vec::new()),
            ambiguities: Mutex::new(Vec::new()),
            stale: Mutex::new(BTreeSet::new()),
            transformed: Mutex::new(BTreeSet::new()),
            progress: self
                .progress
                .then(|| ProgressLine::with_label("transform", &[("modules", 0)])),
        };

        let entries = pass.resolve_entries();
        let document = pass.document_root();
        let spawn_all = || {
            rayon::scope(|scope| {
                for path in entries.iter().flat_map(|(_, roots)| roots).chain(&document) {
                    let pass = &pass;
                    let path = path.clone();
                    scope.spawn(move |scope| pass.visit(scope, path));
                }
            });
        };
        match worker_pool(session.workers) {
            Some(pool) => pool.install(spawn_all),
            None => spawn_all(),
        }

        pass.finish(entries, document)
    }
}

fn worker_pool(workers: Option<usize>) -> Option<rayon::ThreadPool> {
    let threads = workers?;
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("weft-worker-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(err) => {
            log!("warning"; "cannot start {} workers ({}), using the global pool", threads, err);
            None
        }
    }
}

/// Shared state of one pass.
struct Pass<'a> {
    session: &'a BuildSession,
    executor: Executor<'a>,
    resolver: Resolver,
    previous: Option<(&'a ModuleGraph, &'a BTreeSet<PathBuf>)>,
    tick: u64,
    claimed: DashSet<PathBuf>,
    done: DashMap<ModuleId, (Arc<Module>, Vec<Edge>)>,
    errors: Mutex<Vec<BuildError>>,
    recovered: Mutex<Vec<BuildError>>,
    ambiguities: Mutex<Vec<RuleMatchAmbiguity>>,
    stale: Mutex<BTreeSet<ModuleId>>,
    transformed: Mutex<BTreeSet<ModuleId>>,
    progress: Option<ProgressLine>,
}

impl<'a> Pass<'a> {
    fn resolve_entries(&self) -> Vec<(String, Vec<PathBuf>)> {
        self.session
            .entries
            .iter()
            .map(|entry| {
                let roots = entry
                    .specifiers
                    .iter()
                    .filter_map(|specifier| {
                        let resolved = self.resolver.resolve(&self.session.context, specifier);
                        if resolved.is_none() {
                            self.errors.lock().push(
                                ResolutionError {
                                    from_module: ModuleId::entry(&entry.name),
                                    reference: specifier.clone(),
                                }
                                .into(),
                            );
                        }
                        resolved
                    })
                    .collect();
                (entry.name.clone(), roots)
            })
            .collect()
    }

    /// The entry document template joins the graph when a rule matches it,
    /// so its references are resolved and emitted like any other.
    fn document_root(&self) -> Option<PathBuf> {
        let template = &self.session.html.as_ref()?.template;
        if self.session.rules.matching(template).is_empty() {
            return None;
        }
        Some(template.clone())
    }

    fn visit<'scope>(&'scope self, scope: &rayon::Scope<'scope>, path: PathBuf) {
        if !self.claimed.insert(path.clone()) {
            return;
        }
        let Some(module) = self.load(&path) else {
            return;
        };

        let from_dir = path.parent().unwrap_or(Path::new(""));
        let mut edges = Vec::with_capacity(module.dependencies.len());
        for dependency in &module.dependencies {
            let Some(target) = self.resolver.resolve(from_dir, &dependency.specifier) else {
                self.errors.lock().push(
                    ResolutionError {
                        from_module: module.id.clone(),
                        reference: dependency.raw.clone(),
                    }
                    .into(),
                );
                continue;
            };
            edges.push(Edge {
                raw: dependency.raw.clone(),
                specifier: dependency.specifier.clone(),
                target: ModuleId::from_path(&self.session.root, &target),
                kind: dependency.kind,
            });
            scope.spawn(move |scope| self.visit(scope, target));
        }

        self.done.insert(module.id.clone(), (module, edges));
    }

    /// Reuse the previous module for clean files, otherwise transform.
    fn load(&self, path: &Path) -> Option<Arc<Module>> {
        let id = ModuleId::from_path(&self.session.root, path);
        let previous = self.previous.and_then(|(graph, _)| graph.module(&id));

        if let Some((_, dirty)) = self.previous
            && let Some(module) = previous
            && !dirty.contains(path)
        {
            return Some(Arc::clone(module));
        }

        match self.executor.run(path, self.tick) {
            Ok(executed) => {
                if let Some(ambiguity) = executed.ambiguity {
                    self.ambiguities.lock().push(ambiguity);
                }
                if let Some(progress) = &self.progress {
                    progress.inc("modules");
                }
                self.transformed.lock().insert(id);
                Some(Arc::new(executed.module))
            }
            Err(err) => {
                let keep = matches!(err, BuildError::Transform(_)) && self.session.profile.retain_stale;
                match previous {
                    Some(module) if keep => {
                        debug!("build"; "keeping stale {}", id);
                        self.recovered.lock().push(err);
                        self.stale.lock().insert(id);
                        Some(Arc::clone(module))
                    }
                    _ => {
                        self.errors.lock().push(err);
                        None
                    }
                }
            }
        }
    }

    fn finish(self, entries: Vec<(String, Vec<PathBuf>)>, document: Option<PathBuf>) -> BuildOutcome {
        if let Some(progress) = self.progress {
            progress.finish();
        }

        let done: BTreeMap<ModuleId, (Arc<Module>, Vec<Edge>)> = self.done.into_iter().collect();
        let mut graph = ModuleGraph::new();
        for (_, (module, edges)) in done {
            graph.insert(module, edges);
        }
        for (name, roots) in entries {
            let ids = roots
                .iter()
                .map(|path| ModuleId::from_path(&self.session.root, path))
                .collect();
            graph.add_entry(name, ids);
        }
        if let Some(path) = document {
            graph.set_document(ModuleId::from_path(&self.session.root, &path));
        }

        let mut errors = self.errors.into_inner();
        errors.sort_by_cached_key(ToString::to_string);
        let mut recovered = self.recovered.into_inner();
        recovered.sort_by_cached_key(ToString::to_string);
        let mut ambiguities = self.ambiguities.into_inner();
        ambiguities.sort_by(|a, b| a.file.cmp(&b.file));

        BuildOutcome {
            graph,
            errors,
            recovered,
            ambiguities,
            stale: self.stale.into_inner(),
            transformed: self.transformed.into_inner(),
        }
    }
}
