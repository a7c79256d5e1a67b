//! In-memory relationship graph.
//!
//! [`RelationGraph`] is a derived, rebuildable view of the vault's
//! relationship front-matter. It owns no persistence; the document store is
//! the single source of truth and the graph can be dropped and rebuilt by a
//! full rescan at any time. The [`crate::engine::SyncEngine`] is the only
//! component allowed to mutate it.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::{algo::is_cyclic_directed, graphmap::DiGraphMap};
use serde::{Deserialize, Serialize};

use crate::properties::{VaultPath, ZettelId};

/// The relationship state of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub path: VaultPath,
    /// Declared parent references, possibly more than one before resolution.
    pub parents: BTreeSet<VaultPath>,
    pub children: BTreeSet<VaultPath>,
    /// User-declared related references, symmetric.
    pub related_direct: BTreeSet<VaultPath>,
    /// Sibling-derived related references. Recomputable from scratch from
    /// current resolved parents; never the source of truth.
    pub related_derived: BTreeSet<VaultPath>,
    /// Single canonical parent chosen by the resolver. Absent when the node
    /// has no parent.
    pub resolved_parent: Option<VaultPath>,
    /// Which parent candidate is canonical when several are declared.
    pub priority_marker: Option<VaultPath>,
    /// Assigned exactly once, immutable thereafter.
    pub zettel_id: Option<ZettelId>,
    /// Derived display title, absent when derivation is off for this path.
    pub title: Option<String>,
}

impl NodeState {
    pub fn new(path: VaultPath) -> Self {
        NodeState {
            path,
            ..Default::default()
        }
    }

    /// The union of direct and derived related references, as persisted to
    /// the store (which does not distinguish origin).
    pub fn related_all(&self) -> BTreeSet<VaultPath> {
        self.related_direct
            .union(&self.related_derived)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationGraph {
    states: BTreeMap<VaultPath, NodeState>,
}

impl RelationGraph {
    pub fn node(&self, path: &VaultPath) -> Option<&NodeState> {
        self.states.get(path)
    }

    pub fn node_mut(&mut self, path: &VaultPath) -> Option<&mut NodeState> {
        self.states.get_mut(path)
    }

    pub fn contains(&self, path: &VaultPath) -> bool {
        self.states.contains_key(path)
    }

    /// Fetch or create the node for `path`. Creation marks first observation;
    /// the identifier assignor keys off a `None` zettel_id afterwards.
    pub fn ensure_node(&mut self, path: &VaultPath) -> &mut NodeState {
        self.states
            .entry(path.clone())
            .or_insert_with(|| NodeState::new(path.clone()))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = (&VaultPath, &NodeState)> {
        self.states.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &VaultPath> {
        self.states.keys()
    }

    /// Remove a node that disappeared from the store, cleaning the inverse
    /// edges on every neighbor that referenced it. Returns the neighbors
    /// whose edge sets changed. Dangling references *to* the removed node
    /// held by documents are reported by the engine, not silently retained
    /// in the graph.
    pub fn remove_node(&mut self, path: &VaultPath) -> Vec<VaultPath> {
        let Some(removed) = self.states.remove(path) else {
            return vec![];
        };
        let mut neighbors: BTreeSet<VaultPath> = BTreeSet::new();
        neighbors.extend(removed.parents.iter().cloned());
        neighbors.extend(removed.children.iter().cloned());
        neighbors.extend(removed.related_direct.iter().cloned());
        neighbors.extend(removed.related_derived.iter().cloned());

        let mut touched = Vec::new();
        for neighbor_path in neighbors {
            if let Some(neighbor) = self.states.get_mut(&neighbor_path) {
                let mut changed = neighbor.parents.remove(path);
                changed |= neighbor.children.remove(path);
                changed |= neighbor.related_direct.remove(path);
                changed |= neighbor.related_derived.remove(path);
                if neighbor.resolved_parent.as_ref() == Some(path) {
                    neighbor.resolved_parent = None;
                    changed = true;
                }
                if changed {
                    touched.push(neighbor_path);
                }
            }
        }
        tracing::debug!(
            "[graph] Removed {path}, cleaned inverse edges on {} neighbor(s)",
            touched.len()
        );
        touched
    }

    /// Walk the resolved-parent chain upward from `path`, excluding `path`
    /// itself. Stops at the first missing link or at a repeated node, so it
    /// terminates even on a graph that temporarily violates acyclicity.
    pub fn ancestors(&self, path: &VaultPath) -> Vec<VaultPath> {
        let mut chain = Vec::new();
        let mut seen: BTreeSet<&VaultPath> = BTreeSet::new();
        seen.insert(path);
        let mut cursor = self
            .states
            .get(path)
            .and_then(|n| n.resolved_parent.as_ref());
        while let Some(parent) = cursor {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.clone());
            cursor = self
                .states
                .get(parent)
                .and_then(|n| n.resolved_parent.as_ref());
        }
        chain
    }

    /// All nodes whose resolved parent is `parent`, in stable order.
    pub fn children_of_resolved(&self, parent: &VaultPath) -> Vec<VaultPath> {
        self.states
            .values()
            .filter(|n| n.resolved_parent.as_ref() == Some(parent))
            .map(|n| n.path.clone())
            .collect()
    }

    /// Every declared `child -> parent` edge currently in the graph. All
    /// declared parents count, not just the resolved ones; a multi-parent
    /// node keeps inverse edges on every declared parent, so acyclicity has
    /// to hold over the full declared relation.
    fn declared_parent_edges(&self) -> Vec<(&VaultPath, &VaultPath)> {
        let mut edges = Vec::new();
        for node in self.states.values() {
            for parent in &node.parents {
                edges.push((&node.path, parent));
            }
        }
        edges
    }

    /// Intern the edges into a `DiGraphMap` over dense indices (vault paths
    /// are not `Copy`) and let `petgraph::algo::is_cyclic_directed` give the
    /// verdict.
    fn relation_is_cyclic(edges: &[(&VaultPath, &VaultPath)]) -> bool {
        let mut ids: BTreeMap<&VaultPath, usize> = BTreeMap::new();
        for &(a, b) in edges {
            let n = ids.len();
            ids.entry(a).or_insert(n);
            let n = ids.len();
            ids.entry(b).or_insert(n);
        }
        let graph: DiGraphMap<usize, ()> =
            DiGraphMap::from_edges(edges.iter().map(|(a, b)| (ids[a], ids[b])));
        is_cyclic_directed(&graph)
    }

    /// Simulate adding `child -> candidate_parent` to the declared parent
    /// relation and test whether the relation would become cyclic.
    ///
    /// The check runs over declared edges rather than last pass's resolved
    /// chain: during a bulk pass, edges accepted moments ago are declared but
    /// not yet resolved, and a cycle closed through them must still be
    /// caught.
    pub fn would_create_cycle(&self, child: &VaultPath, candidate_parent: &VaultPath) -> bool {
        if child == candidate_parent {
            return true;
        }
        let mut edges = self.declared_parent_edges();
        edges.push((child, candidate_parent));
        Self::relation_is_cyclic(&edges)
    }

    /// Test support: assert the edge invariants hold for every node pair.
    /// Returns the list of violations instead of panicking so tests can show
    /// all of them at once.
    pub fn verify_invariants(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (path, node) in &self.states {
            for parent in &node.parents {
                if let Some(parent_node) = self.states.get(parent) {
                    if !parent_node.children.contains(path) {
                        violations.push(format!(
                            "parent/child inverse: {path} lists parent {parent}, but {parent} does not list child {path}"
                        ));
                    }
                }
            }
            for child in &node.children {
                if let Some(child_node) = self.states.get(child) {
                    if !child_node.parents.contains(path) {
                        violations.push(format!(
                            "parent/child inverse: {path} lists child {child}, but {child} does not list parent {path}"
                        ));
                    }
                }
            }
            for related in &node.related_direct {
                if let Some(other) = self.states.get(related) {
                    if !other.related_direct.contains(path) {
                        violations.push(format!(
                            "related symmetry: {path} <-> {related} is one-sided"
                        ));
                    }
                }
            }
            for related in &node.related_derived {
                if let Some(other) = self.states.get(related) {
                    if !other.related_derived.contains(path) {
                        violations.push(format!(
                            "derived related symmetry: {path} <-> {related} is one-sided"
                        ));
                    }
                }
            }
        }
        let mut edges = self.declared_parent_edges();
        for node in self.states.values() {
            if let Some(resolved) = &node.resolved_parent {
                edges.push((&node.path, resolved));
            }
        }
        if Self::relation_is_cyclic(&edges) {
            violations.push("acyclicity: the parent relation contains a cycle".to_string());
        }
        violations
    }
}
