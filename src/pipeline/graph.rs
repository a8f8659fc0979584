//! KindGraph - dependency graph over artifact kinds
//!
//! Edges point from a dependency kind to the kinds that depend on it.
//! - Cycle detection using DFS three-color marking
//! - Kahn layering into levels; every kind of level N only depends on kinds
//!   of earlier levels, which is the join barrier the runner enforces

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::error::{RegistrarError, Result};
use crate::kind::ArtifactKind;

/// Most kinds have zero or one dependency / dependent
pub type KindVec = SmallVec<[ArtifactKind; 2]>;

pub struct KindGraph {
    /// dependency -> dependents
    adjacency: FxHashMap<ArtifactKind, KindVec>,
    /// dependent -> dependencies
    predecessors: FxHashMap<ArtifactKind, KindVec>,
    /// All kinds, sorted by id for deterministic traversal
    kinds: Vec<ArtifactKind>,
}

impl KindGraph {
    /// Build from nodes and `(dependency, dependent)` edges. Edges touching a
    /// kind outside `kinds` are dropped; duplicate edges collapse.
    pub fn new(
        kinds: impl IntoIterator<Item = ArtifactKind>,
        edges: impl IntoIterator<Item = (ArtifactKind, ArtifactKind)>,
    ) -> Self {
        let mut kinds: Vec<ArtifactKind> = kinds.into_iter().collect();
        kinds.sort();
        kinds.dedup();

        let mut adjacency: FxHashMap<ArtifactKind, KindVec> =
            kinds.iter().map(|k| (*k, KindVec::new())).collect();
        let mut predecessors: FxHashMap<ArtifactKind, KindVec> =
            kinds.iter().map(|k| (*k, KindVec::new())).collect();

        for (dependency, dependent) in edges {
            if !adjacency.contains_key(&dependency) || !adjacency.contains_key(&dependent) {
                continue;
            }
            let successors = adjacency.entry(dependency).or_default();
            if !successors.contains(&dependent) {
                successors.push(dependent);
                predecessors.entry(dependent).or_default().push(dependency);
            }
        }

        Self {
            adjacency,
            predecessors,
            kinds,
        }
    }

    #[inline]
    pub fn get_dependencies(&self, kind: &ArtifactKind) -> &[ArtifactKind] {
        self.predecessors.get(kind).map_or(&[] as &[ArtifactKind], SmallVec::as_slice)
    }

    #[inline]
    pub fn get_dependents(&self, kind: &ArtifactKind) -> &[ArtifactKind] {
        self.adjacency.get(kind).map_or(&[] as &[ArtifactKind], SmallVec::as_slice)
    }

    #[inline]
    pub fn contains(&self, kind: &ArtifactKind) -> bool {
        self.adjacency.contains_key(kind)
    }

    pub fn kinds(&self) -> &[ArtifactKind] {
        &self.kinds
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: &ArtifactKind, to: &ArtifactKind) -> bool {
        if from == to {
            return true;
        }

        let mut visited: FxHashSet<ArtifactKind> = FxHashSet::default();
        let mut queue: VecDeque<ArtifactKind> = VecDeque::new();
        queue.push_back(*from);
        visited.insert(*from);

        while let Some(current) = queue.pop_front() {
            for next in self.get_dependents(&current) {
                if next == to {
                    return true;
                }
                if visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }

        false
    }

    /// Detect cycles using DFS with three-color marking.
    ///
    /// A cycle is found when traversal reaches a Gray (in-progress) node; the
    /// error names the path, e.g. `a → b → a`.
    pub fn detect_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            node: ArtifactKind,
            adjacency: &FxHashMap<ArtifactKind, KindVec>,
            colors: &mut FxHashMap<ArtifactKind, Color>,
            stack: &mut Vec<ArtifactKind>,
        ) -> std::result::Result<(), String> {
            colors.insert(node, Color::Gray);
            stack.push(node);

            if let Some(neighbors) = adjacency.get(&node) {
                for neighbor in neighbors {
                    match colors.get(neighbor) {
                        Some(Color::Gray) => {
                            let start = stack.iter().position(|k| k == neighbor).unwrap_or(0);
                            let cycle: Vec<&str> = stack[start..].iter().map(|k| k.id()).collect();
                            return Err(format!("{} → {}", cycle.join(" → "), neighbor));
                        }
                        Some(Color::White) | None => dfs(*neighbor, adjacency, colors, stack)?,
                        Some(Color::Black) => {}
                    }
                }
            }

            stack.pop();
            colors.insert(node, Color::Black);
            Ok(())
        }

        let mut colors: FxHashMap<ArtifactKind, Color> =
            self.kinds.iter().map(|k| (*k, Color::White)).collect();
        let mut stack = Vec::new();

        for kind in &self.kinds {
            if colors.get(kind) == Some(&Color::White) {
                dfs(*kind, &self.adjacency, &mut colors, &mut stack)
                    .map_err(|cycle| RegistrarError::CyclicDependency { cycle })?;
            }
        }

        Ok(())
    }

    /// Topological levels (Kahn). Fails with `CyclicDependency` first if the
    /// graph is not a DAG.
    pub fn levels(&self) -> Result<Vec<Vec<ArtifactKind>>> {
        self.detect_cycles()?;

        let mut in_degree: FxHashMap<ArtifactKind, usize> = self
            .kinds
            .iter()
            .map(|k| (*k, self.get_dependencies(k).len()))
            .collect();

        let mut current: Vec<ArtifactKind> = self
            .kinds
            .iter()
            .filter(|k| in_degree.get(*k) == Some(&0))
            .copied()
            .collect();
        let mut levels = Vec::new();

        while !current.is_empty() {
            let mut next = Vec::new();
            for kind in &current {
                for dependent in self.get_dependents(kind) {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(*dependent);
                        }
                    }
                }
            }
            next.sort();
            levels.push(current);
            current = next;
        }

        Ok(levels)
    }

    /// Flattened topological order
    pub fn topological_order(&self) -> Result<Vec<ArtifactKind>> {
        Ok(self.levels()?.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Side;

    const A: ArtifactKind = ArtifactKind::new("a", Side::Server);
    const B: ArtifactKind = ArtifactKind::new("b", Side::Server);
    const C: ArtifactKind = ArtifactKind::new("c", Side::Server);
    const D: ArtifactKind = ArtifactKind::new("d", Side::Server);

    #[test]
    fn linear_chain_orders_levels() {
        let graph = KindGraph::new([C, B, A], [(A, B), (B, C)]);
        assert_eq!(graph.levels().unwrap(), vec![vec![A], vec![B], vec![C]]);
        assert!(graph.has_path(&A, &C));
        assert!(!graph.has_path(&C, &A));
    }

    #[test]
    fn detect_cycle_names_path() {
        let graph = KindGraph::new([A, B], [(A, B), (B, A)]);
        let err = graph.levels().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("REG-020"));
        assert!(msg.contains("a → b → a"));
    }

    #[test]
    fn self_loop_is_cycle() {
        let graph = KindGraph::new([A], [(A, A)]);
        assert!(graph.detect_cycles().is_err());
    }

    #[test]
    fn diamond_has_three_levels() {
        let graph = KindGraph::new([A, B, C, D], [(A, B), (A, C), (B, D), (C, D)]);
        let levels = graph.levels().unwrap();
        assert_eq!(levels, vec![vec![A], vec![B, C], vec![D]]);
        assert_eq!(graph.get_dependencies(&D).len(), 2);
    }

    #[test]
    fn disconnected_kinds_share_first_level() {
        let graph = KindGraph::new([A, B, C, D], [(A, B), (C, D)]);
        let levels = graph.levels().unwrap();
        assert_eq!(levels[0], vec![A, C]);
        assert_eq!(levels[1], vec![B, D]);
    }

    #[test]
    fn edges_to_unknown_kinds_are_dropped() {
        let graph = KindGraph::new([B], [(A, B)]);
        assert!(graph.get_dependencies(&B).is_empty());
        assert!(!graph.contains(&A));
        assert_eq!(graph.topological_order().unwrap(), vec![B]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let graph = KindGraph::new([A, B], [(A, B), (A, B)]);
        assert_eq!(graph.get_dependents(&A).len(), 1);
    }
}
