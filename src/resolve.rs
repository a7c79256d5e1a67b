//! Parent resolution and sibling inference.
//!
//! Resolution picks the single canonical parent used for hierarchy and title
//! derivation. Ambiguity never blocks reconciliation; it only downgrades
//! confidence via a [`SyncDiagnostic::ConflictingParent`].

use std::collections::BTreeSet;

use crate::{
    diagnostic::SyncDiagnostic,
    graph::RelationGraph,
    properties::VaultPath,
};

/// Select the canonical parent among zero, one, or many candidates.
///
/// - zero candidates: no resolved parent;
/// - exactly one: that one;
/// - several: the priority marker wins if it names a candidate; otherwise the
///   first candidate in stable (lexicographic) order is chosen and a
///   `ConflictingParent` diagnostic is raised.
pub fn resolve_parent(
    path: &VaultPath,
    parents: &BTreeSet<VaultPath>,
    priority_marker: Option<&VaultPath>,
) -> (Option<VaultPath>, Option<SyncDiagnostic>) {
    match parents.len() {
        0 => (None, None),
        1 => (parents.iter().next().cloned(), None),
        _ => {
            if let Some(marker) = priority_marker {
                if parents.contains(marker) {
                    return (Some(marker.clone()), None);
                }
            }
            // BTreeSet iteration order is the stable default.
            let chosen = parents
                .iter()
                .next()
                .cloned()
                .expect("non-empty candidate set");
            let diagnostic = SyncDiagnostic::conflicting(
                path,
                parents.iter().cloned().collect(),
                &chosen,
            );
            (Some(chosen), Some(diagnostic))
        }
    }
}

/// Recomputes the sibling-derived related layer.
///
/// Derived edges are a strict subset of the graph recomputable at any time
/// from current resolved parents. They live in their own `related_derived`
/// set so regeneration never deletes user-declared direct edges.
pub struct SiblingInferrer;

impl SiblingInferrer {
    /// Rebuild `related_derived` from scratch for every child of each parent
    /// in `touched_parents`. Children sharing a resolved parent become
    /// pairwise related; nodes outside the sibling group are untouched.
    ///
    /// Children of a touched parent may previously have belonged to a
    /// different group, so each child's derived set is cleared before the
    /// new groups are written. Returns the nodes whose derived set changed,
    /// so the engine can include them in the write-back plan.
    pub fn recompute(
        graph: &mut RelationGraph,
        touched_parents: &BTreeSet<VaultPath>,
    ) -> BTreeSet<VaultPath> {
        let mut affected: BTreeSet<VaultPath> = BTreeSet::new();
        for parent in touched_parents {
            affected.extend(graph.children_of_resolved(parent));
        }
        let mut changed: BTreeSet<VaultPath> = BTreeSet::new();
        for path in &affected {
            if let Some(node) = graph.node_mut(path) {
                if !node.related_derived.is_empty() {
                    changed.insert(path.clone());
                }
                node.related_derived.clear();
            }
        }
        for parent in touched_parents {
            let siblings = graph.children_of_resolved(parent);
            if siblings.len() < 2 {
                continue;
            }
            tracing::debug!(
                "[siblings] Deriving related edges among {} children of {parent}",
                siblings.len()
            );
            for a in &siblings {
                for b in &siblings {
                    if a == b {
                        continue;
                    }
                    if let Some(node) = graph.node_mut(a) {
                        if node.related_derived.insert(b.clone()) {
                            changed.insert(a.clone());
                        }
                    }
                }
            }
        }
        changed
    }

    /// Retract every derived edge, used when sibling inference is disabled.
    /// Direct edges are untouched; references already persisted by earlier
    /// runs cannot be distinguished from user edges in the store and are left
    /// in place there. Returns the nodes whose derived set was non-empty.
    pub fn clear(graph: &mut RelationGraph) -> BTreeSet<VaultPath> {
        let paths: Vec<VaultPath> = graph.paths().cloned().collect();
        let mut changed = BTreeSet::new();
        for path in paths {
            if let Some(node) = graph.node_mut(&path) {
                if !node.related_derived.is_empty() {
                    changed.insert(path.clone());
                }
                node.related_derived.clear();
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> VaultPath {
        VaultPath::from(s)
    }

    #[test]
    fn test_resolution_zero_and_one() {
        let (resolved, diag) = resolve_parent(&p("x.md"), &BTreeSet::new(), None);
        assert!(resolved.is_none());
        assert!(diag.is_none());

        let parents: BTreeSet<_> = [p("only.md")].into();
        let (resolved, diag) = resolve_parent(&p("x.md"), &parents, None);
        assert_eq!(resolved, Some(p("only.md")));
        assert!(diag.is_none());
    }

    #[test]
    fn test_ambiguity_is_deterministic_with_diagnostic() {
        let parents: BTreeSet<_> = [p("B.md"), p("A.md")].into();
        let (resolved, diag) = resolve_parent(&p("x.md"), &parents, None);
        assert_eq!(resolved, Some(p("A.md")));
        assert!(diag.unwrap().is_conflicting_parent());
    }

    #[test]
    fn test_priority_marker_wins() {
        let parents: BTreeSet<_> = [p("A.md"), p("B.md")].into();
        let (resolved, diag) = resolve_parent(&p("x.md"), &parents, Some(&p("B.md")));
        assert_eq!(resolved, Some(p("B.md")));
        assert!(diag.is_none());

        // A marker naming a non-candidate falls back to the default.
        let (resolved, diag) = resolve_parent(&p("x.md"), &parents, Some(&p("C.md")));
        assert_eq!(resolved, Some(p("A.md")));
        assert!(diag.unwrap().is_conflicting_parent());
    }

    fn family(graph: &mut RelationGraph, parent: &str, children: &[&str]) {
        graph.ensure_node(&p(parent));
        for child in children {
            let node = graph.ensure_node(&p(child));
            node.resolved_parent = Some(p(parent));
        }
    }

    #[test]
    fn test_sibling_groups_are_pairwise_and_scoped() {
        let mut graph = RelationGraph::default();
        family(&mut graph, "P.md", &["a.md", "b.md", "c.md"]);
        family(&mut graph, "Q.md", &["z.md"]);

        SiblingInferrer::recompute(&mut graph, &[p("P.md"), p("Q.md")].into());

        for (a, b) in [("a.md", "b.md"), ("a.md", "c.md"), ("b.md", "c.md")] {
            assert!(graph.node(&p(a)).unwrap().related_derived.contains(&p(b)));
            assert!(graph.node(&p(b)).unwrap().related_derived.contains(&p(a)));
        }
        // Single child gets no derived edges; outsiders are untouched.
        assert!(graph.node(&p("z.md")).unwrap().related_derived.is_empty());
        assert!(!graph.node(&p("a.md")).unwrap().related_derived.contains(&p("z.md")));
        assert!(graph.verify_invariants().is_empty());
    }

    #[test]
    fn test_recompute_clears_stale_membership() {
        let mut graph = RelationGraph::default();
        family(&mut graph, "P.md", &["a.md", "b.md"]);
        SiblingInferrer::recompute(&mut graph, &[p("P.md")].into());
        assert!(!graph.node(&p("a.md")).unwrap().related_derived.is_empty());

        // b moves away; a's derived edge to b must disappear.
        graph.node_mut(&p("b.md")).unwrap().resolved_parent = Some(p("Q.md"));
        graph.ensure_node(&p("Q.md"));
        SiblingInferrer::recompute(&mut graph, &[p("P.md"), p("Q.md")].into());
        assert!(graph.node(&p("a.md")).unwrap().related_derived.is_empty());
        assert!(graph.node(&p("b.md")).unwrap().related_derived.is_empty());
    }

    #[test]
    fn test_clear_retracts_derived_only() {
        let mut graph = RelationGraph::default();
        family(&mut graph, "P.md", &["a.md", "b.md"]);
        graph.node_mut(&p("a.md")).unwrap().related_direct.insert(p("b.md"));
        graph.node_mut(&p("b.md")).unwrap().related_direct.insert(p("a.md"));
        SiblingInferrer::recompute(&mut graph, &[p("P.md")].into());

        SiblingInferrer::clear(&mut graph);
        assert!(graph.node(&p("a.md")).unwrap().related_derived.is_empty());
        assert!(graph.node(&p("a.md")).unwrap().related_direct.contains(&p("b.md")));
    }
}
