//! Chunk load order.

use std::collections::{BTreeMap, BTreeSet};

use super::Chunk;
use crate::core::ModuleId;
use crate::graph::ModuleGraph;
use crate::transform::DependencyKind;

/// Sort chunks so every chunk follows the chunks its modules import from.
///
/// Ready chunks are taken shared-first, then by declaration rank. A cycle
/// between chunks is broken the same way.
pub fn load_order(graph: &ModuleGraph, chunks: Vec<Chunk>) -> Vec<Chunk> {
    let owner: BTreeMap<&ModuleId, usize> = chunks
        .iter()
        .enumerate()
        .flat_map(|(i, chunk)| chunk.modules.iter().map(move |id| (id, i)))
        .collect();

    // requires[i]: chunks that must load before chunk i
    let mut requires: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); chunks.len()];
    for (i, chunk) in chunks.iter().enumerate() {
        for id in &chunk.modules {
            for edge in graph.edges(id) {
                if edge.kind != DependencyKind::Import {
                    continue;
                }
                if let Some(&j) = owner.get(&edge.target)
                    && j != i
                {
                    requires[i].insert(j);
                }
            }
        }
    }

    let key = |i: usize| (chunks[i].is_entry, chunks[i].rank, i);
    let mut placed = vec![false; chunks.len()];
    let mut sequence = Vec::with_capacity(chunks.len());

    while sequence.len() < chunks.len() {
        let pending = (0..chunks.len()).filter(|&i| !placed[i]);
        let next = pending
            .clone()
            .filter(|&i| requires[i].iter().all(|&j| placed[j]))
            .min_by_key(|&i| key(i))
            .or_else(|| pending.min_by_key(|&i| key(i)));
        let Some(next) = next else {
            break;
        };
        placed[next] = true;
        sequence.push(next);
    }

    let mut slots: Vec<Option<Chunk>> = chunks.into_iter().map(Some).collect();
    sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::graph;

    fn chunk(name: &str, modules: &[&str], is_entry: bool, rank: usize) -> Chunk {
        Chunk {
            name: name.into(),
            modules: modules.iter().map(|m| ModuleId::new(*m)).collect(),
            is_entry,
            roots: Vec::new(),
            rank,
        }
    }

    #[test]
    fn test_dependencies_load_first() {
        let g = graph(
            &[("a.js", 1, &["b.js"]), ("b.js", 1, &["lib.js"]), ("lib.js", 1, &[])],
            &[("a", "a.js"), ("b", "b.js")],
        );
        let chunks = vec![
            chunk("a", &["a.js"], true, 0),
            chunk("b", &["b.js"], true, 1),
            chunk("lib", &["lib.js"], false, 2),
        ];
        let names: Vec<_> = load_order(&g, chunks).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["lib", "b", "a"]);
    }

    #[test]
    fn test_cycle_broken_by_rank() {
        let g = graph(
            &[("a.js", 1, &["b.js"]), ("b.js", 1, &["a.js"])],
            &[("a", "a.js"), ("b", "b.js")],
        );
        let chunks = vec![chunk("b", &["b.js"], true, 1), chunk("a", &["a.js"], true, 0)];
        let names: Vec<_> = load_order(&g, chunks).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
