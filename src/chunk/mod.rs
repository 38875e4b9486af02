//! Chunk splitting.
//!
//! Runs once the graph is closed, in four fixed steps:
//!
//! 1. **entry assignment**: every entry claims the modules it reaches that no
//!    earlier entry claimed; forced modules go to their named chunk
//! 2. **commons extraction**: modules reached by two or more entries move
//!    to the shared chunk (entry roots stay put)
//! 3. **min-size folding**: small non-entry chunks fold into the first entry
//!    that reaches them
//! 4. **max-count merging**: the smallest chunk merges into the next-smallest
//!    of its class until the cap holds
//!
//! Everything is keyed by ordered maps; the result depends only on the graph
//! and the policy.

mod order;
mod policy;

pub use order::load_order;
pub use policy::{ForcedChunk, SplitPolicy};

use std::collections::{BTreeMap, BTreeSet};

use crate::core::ModuleId;
use crate::graph::ModuleGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChunkClass {
    Entry,
    Shared,
}

/// An output script chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    /// Member modules, dependencies first
    pub modules: Vec<ModuleId>,
    pub is_entry: bool,
    /// Entry modules to run when the chunk loads, in declaration order
    pub roots: Vec<ModuleId>,
    /// Declaration rank, used to break ties
    pub rank: usize,
}

impl Chunk {
    pub fn class(&self) -> ChunkClass {
        if self.is_entry {
            ChunkClass::Entry
        } else {
            ChunkClass::Shared
        }
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains(id)
    }
}

/// Partition `graph` into chunks, returned in load order.
pub fn split(graph: &ModuleGraph, policy: &SplitPolicy) -> Vec<Chunk> {
    let mut drafts = assign(graph, policy);
    fold_small(&mut drafts, policy.min_chunk_size);
    merge_to_cap(&mut drafts, policy.max_chunks);

    let position: BTreeMap<ModuleId, usize> = graph
        .global_order()
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();

    let chunks = drafts
        .into_iter()
        .map(|draft| {
            let name = draft.name();
            let mut modules: Vec<ModuleId> = draft.modules.into_iter().collect();
            modules.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
            Chunk {
                name,
                is_entry: draft.class == ChunkClass::Entry,
                modules,
                roots: draft.roots,
                rank: draft.rank,
            }
        })
        .collect();
    load_order(graph, chunks)
}

// ============================================================================
// drafts
// ============================================================================

#[derive(Debug)]
struct Draft {
    /// `(rank, name)` of every chunk merged into this one
    parts: Vec<(usize, String)>,
    class: ChunkClass,
    rank: usize,
    roots: Vec<ModuleId>,
    modules: BTreeSet<ModuleId>,
    /// Entries (by index) reaching any member
    reach: BTreeSet<usize>,
    size: usize,
}

impl Draft {
    fn new(name: &str, class: ChunkClass, rank: usize) -> Self {
        Self {
            parts: vec![(rank, name.to_string())],
            class,
            rank,
            roots: Vec::new(),
            modules: BTreeSet::new(),
            reach: BTreeSet::new(),
            size: 0,
        }
    }

    fn name(&self) -> String {
        let mut parts = self.parts.clone();
        parts.sort();
        parts
            .into_iter()
            .map(|(_, name)| name)
            .collect::<Vec<_>>()
            .join("~")
    }

    fn absorb(&mut self, other: Draft) {
        let roots = if other.rank < self.rank {
            other.roots.into_iter().chain(self.roots.drain(..)).collect()
        } else {
            self.roots.drain(..).chain(other.roots).collect()
        };
        self.roots = roots;
        if other.class == ChunkClass::Entry {
            self.class = ChunkClass::Entry;
        }
        self.rank = self.rank.min(other.rank);
        self.parts.extend(other.parts);
        self.modules.extend(other.modules);
        self.reach.extend(other.reach);
        self.size += other.size;
    }
}

/// Steps 1 and 2. Empty non-entry drafts are dropped.
fn assign(graph: &ModuleGraph, policy: &SplitPolicy) -> Vec<Draft> {
    let entries = graph.entries();
    let mut drafts: Vec<Draft> = entries
        .iter()
        .enumerate()
        .map(|(i, (name, _))| Draft::new(name, ChunkClass::Entry, i))
        .collect();
    let mut named: BTreeMap<String, usize> = BTreeMap::new();
    for name in policy.forced_names() {
        named.insert(name.to_string(), drafts.len());
        drafts.push(Draft::new(name, ChunkClass::Shared, drafts.len()));
    }

    let mut owner: BTreeMap<ModuleId, usize> = BTreeMap::new();
    let mut reach: BTreeMap<ModuleId, BTreeSet<usize>> = BTreeMap::new();

    // Roots first, so a root reached from an earlier entry still stays home.
    for (index, (_, roots)) in entries.iter().enumerate() {
        for root in roots {
            if graph.contains(root) && !owner.contains_key(root) {
                owner.insert(root.clone(), index);
                drafts[index].roots.push(root.clone());
            }
        }
    }

    for (index, (_, roots)) in entries.iter().enumerate() {
        for id in graph.reachable_from(roots) {
            reach.entry(id.clone()).or_default().insert(index);
            if owner.contains_key(&id) {
                continue;
            }
            let forced = graph
                .module(&id)
                .and_then(|module| module.chunk_affinity.as_ref())
                .and_then(|name| named.get(name).copied());
            owner.insert(id, forced.unwrap_or(index));
        }
    }

    if let Some(commons) = &policy.commons {
        let entry_roots = graph.entry_roots();
        let shared: Vec<ModuleId> = reach
            .iter()
            .filter(|(id, reached)| {
                reached.len() >= 2
                    && !entry_roots.contains(id)
                    && owner.get(*id).is_some_and(|&o| drafts[o].class == ChunkClass::Entry)
            })
            .map(|(id, _)| id.clone())
            .collect();
        if !shared.is_empty() {
            let target = match named.get(commons) {
                Some(&existing) => existing,
                None => {
                    drafts.push(Draft::new(commons, ChunkClass::Shared, drafts.len()));
                    drafts.len() - 1
                }
            };
            for id in shared {
                owner.insert(id, target);
            }
        }
    }

    for (id, index) in owner {
        let draft = &mut drafts[index];
        draft.size += graph.module(&id).map_or(0, |m| m.size());
        if let Some(reached) = reach.get(&id) {
            draft.reach.extend(reached.iter().copied());
        }
        draft.modules.insert(id);
    }

    drafts.retain(|d| d.class == ChunkClass::Entry || !d.modules.is_empty());
    drafts
}

/// Step 3.
fn fold_small(drafts: &mut Vec<Draft>, min_size: Option<usize>) {
    let Some(min_size) = min_size else {
        return;
    };

    let mut i = 0;
    while i < drafts.len() {
        let draft = &drafts[i];
        if draft.class == ChunkClass::Entry || draft.size >= min_size {
            i += 1;
            continue;
        }
        let target = draft.reach.first().and_then(|&entry| {
            drafts
                .iter()
                .position(|d| d.class == ChunkClass::Entry && d.parts.iter().any(|(rank, _)| *rank == entry))
        });
        let Some(target) = target else {
            i += 1;
            continue;
        };

        let small = drafts.remove(i);
        let target = if target > i { target - 1 } else { target };
        crate::debug!("split"; "fold {} ({} bytes) into {}", small.name(), small.size, drafts[target].name());
        let entry = &mut drafts[target];
        entry.modules.extend(small.modules);
        entry.reach.extend(small.reach);
        entry.size += small.size;
    }
}

/// Step 4.
fn merge_to_cap(drafts: &mut Vec<Draft>, max_chunks: Option<usize>) {
    let Some(max_chunks) = max_chunks.map(|m| m.max(1)) else {
        return;
    };

    while drafts.len() > max_chunks {
        let mut by_size: Vec<usize> = (0..drafts.len()).collect();
        by_size.sort_by_key(|&i| (drafts[i].size, drafts[i].rank));

        let same_class = by_size.iter().find_map(|&small| {
            by_size
                .iter()
                .find(|&&other| other != small && drafts[other].class == drafts[small].class)
                .map(|&partner| (small, partner))
        });
        let (small, partner) = same_class.unwrap_or((by_size[0], by_size[1]));

        let source = drafts.remove(small);
        let partner = if partner > small { partner - 1 } else { partner };
        crate::debug!("split"; "merge {} into {}", source.name(), drafts[partner].name());
        drafts[partner].absorb(source);
    }
}
