//! The Sync Engine: sole writer of inverse-relationship edges.
//!
//! A reconciliation pass takes a changeset of nodes whose direct relationship
//! properties changed, converges the graph so the edge invariants hold, and
//! emits a [`WriteBackPlan`] listing every node whose persisted properties
//! must change. Writes to the document store happen only from that plan,
//! after the pass, never mid-pass, so external readers never observe a
//! half-updated pair of documents.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde_yaml::Value;

use crate::{
    assign::{assign_title, assign_zettel_id},
    config::SyncConfig,
    diagnostic::SyncDiagnostic,
    graph::{NodeState, RelationGraph},
    normalize::NormalizedRelations,
    properties::{RawProperties, VaultPath, ZettelId},
    resolve::{resolve_parent, SiblingInferrer},
};

/// What the engine believes the store currently holds for one node, in
/// normalized form. Compared against the graph's desired state to decide
/// which nodes need a write-back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PersistedView {
    parents: BTreeSet<VaultPath>,
    children: BTreeSet<VaultPath>,
    related: BTreeSet<VaultPath>,
    zettel_id: Option<ZettelId>,
    title: Option<String>,
}

/// The per-node property changes to persist after a reconciliation pass.
/// Only properties that actually changed are present; `Value::Null` clears a
/// property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBackPlan {
    pub writes: BTreeMap<VaultPath, RawProperties>,
}

impl WriteBackPlan {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

/// The outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePass {
    pub plan: WriteBackPlan,
    pub diagnostics: Vec<SyncDiagnostic>,
    /// Every node whose graph state changed during the pass.
    pub touched: BTreeSet<VaultPath>,
}

/// Internal accumulator for one pass.
#[derive(Default)]
struct PassState {
    diagnostics: Vec<SyncDiagnostic>,
    touched: BTreeSet<VaultPath>,
    /// Resolved parents (old and new) whose sibling groups need recompute.
    parents_of_interest: BTreeSet<VaultPath>,
}

pub struct SyncEngine {
    graph: RelationGraph,
    persisted: BTreeMap<VaultPath, PersistedView>,
    /// Nodes whose write-back the store rejected, retried on the next full
    /// rescan from whatever the graph holds by then.
    pending_retries: BTreeSet<VaultPath>,
}

impl SyncEngine {
    pub fn new() -> Self {
        SyncEngine {
            graph: RelationGraph::default(),
            persisted: BTreeMap::new(),
            pending_retries: BTreeSet::new(),
        }
    }

    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    /// Reconcile a changeset of `(path, raw front-matter)` pairs.
    ///
    /// `known_paths` is the set of document paths currently present in the
    /// store; references outside it are kept as dangling (diagnosed, never
    /// auto-removed) and receive no inverse updates.
    pub fn reconcile(
        &mut self,
        changeset: Vec<(VaultPath, RawProperties)>,
        known_paths: &BTreeSet<VaultPath>,
        config: &SyncConfig,
    ) -> ReconcilePass {
        let mut state = PassState::default();
        let mut queue: VecDeque<(VaultPath, Option<RawProperties>)> = changeset
            .into_iter()
            .map(|(path, raw)| (path, Some(raw)))
            .collect();
        let mut visited: BTreeSet<VaultPath> = BTreeSet::new();

        // 1-6: converge direct and inverse edges. Counterparts whose edges
        // changed re-enter the queue (without raw properties, their direct
        // sets were already mutated in place); the visited set bounds the
        // recursion even when related edges form reference cycles, which are
        // legal since only the parent relation is required acyclic.
        while let Some((path, maybe_raw)) = queue.pop_front() {
            if let Some(raw) = maybe_raw {
                self.ingest_node_edit(&path, &raw, known_paths, config, &mut state, &mut queue);
            }
            if !visited.insert(path.clone()) {
                continue;
            }
            state.touched.insert(path);
        }

        self.finish_pass(state, config)
    }

    /// A document disappeared from the store: drop its node and clean the
    /// inverse edges on every neighbor that referenced it.
    pub fn remove_node(&mut self, path: &VaultPath, config: &SyncConfig) -> ReconcilePass {
        let mut state = PassState::default();
        if let Some(node) = self.graph.node(path) {
            if let Some(old_parent) = node.resolved_parent.clone() {
                state.parents_of_interest.insert(old_parent);
            }
        }
        let neighbors = self.graph.remove_node(path);
        state.touched.extend(neighbors);
        self.persisted.remove(path);
        self.pending_retries.remove(path);
        self.finish_pass(state, config)
    }

    /// Record a successful write-back: the store now matches the graph for
    /// this node.
    pub fn mark_written(&mut self, path: &VaultPath, config: &SyncConfig) {
        if let Some(node) = self.graph.node(path) {
            let view = Self::desired_view(node, config);
            self.persisted.insert(path.clone(), view);
        }
        self.pending_retries.remove(path);
    }

    /// Record a rejected write-back: queue the node for retry on the next
    /// full rescan, without rolling back the in-memory graph.
    pub fn mark_write_failed(
        &mut self,
        path: &VaultPath,
        message: impl Into<String>,
    ) -> SyncDiagnostic {
        let diagnostic = SyncDiagnostic::write_failure(path, message);
        tracing::warn!("[engine] {diagnostic}");
        self.pending_retries.insert(path.clone());
        diagnostic
    }

    /// Build a fresh plan for the queued failed write-backs and drain the
    /// queue (called by the full rescan). The plan is derived from current
    /// graph state, not from the properties captured at failure time; a
    /// relationship that changed or vanished since the failure must not be
    /// resurrected by its stale write.
    pub fn retry_plan(&mut self, config: &SyncConfig) -> WriteBackPlan {
        let pending = std::mem::take(&mut self.pending_retries);
        self.build_plan(&pending, config)
    }

    pub fn has_pending_retries(&self) -> bool {
        !self.pending_retries.is_empty()
    }

    /// Steps 1-5 for one externally-edited node: normalize, diff against the
    /// last persisted view, pre-check parent edges for cycles, and apply
    /// accepted updates to both sides.
    ///
    /// The diff baseline is what the store last held for this node, never the
    /// live graph. Counterparts earlier in the same pass may already have
    /// written engine-authored inverse edges into this node's graph state;
    /// the node's file does not contain those yet, and reading their absence
    /// as a user removal would delete them from both sides. Only changes
    /// relative to the persisted view count as user edits.
    fn ingest_node_edit(
        &mut self,
        path: &VaultPath,
        raw: &RawProperties,
        known_paths: &BTreeSet<VaultPath>,
        config: &SyncConfig,
        state: &mut PassState,
        queue: &mut VecDeque<(VaultPath, Option<RawProperties>)>,
    ) {
        let (relations, diags) = NormalizedRelations::from_raw(path, raw, config);
        state.diagnostics.extend(diags);

        let prev = self
            .persisted
            .insert(
                path.clone(),
                PersistedView {
                    parents: relations.parents.clone(),
                    children: relations.children.clone(),
                    related: relations.related.clone(),
                    zettel_id: relations.zettel_id.clone(),
                    title: relations.title.clone(),
                },
            )
            .unwrap_or_default();

        let node = self.graph.ensure_node(path);
        node.priority_marker = relations.priority_marker.clone();
        // The store is the source of truth for an existing identifier; the
        // engine only ever fills in a missing one.
        if relations.zettel_id.is_some() {
            node.zettel_id = relations.zettel_id.clone();
        }
        if let Some(old_parent) = node.resolved_parent.clone() {
            state.parents_of_interest.insert(old_parent);
        }
        // Previously derived sibling edges get persisted as plain related
        // references; on re-ingest they are recognized and kept in the
        // derived layer rather than promoted to direct edges.
        let derived = node.related_derived.clone();

        // Removals first, so a replacement edit is cycle-checked without the
        // edges it is dropping.
        for removed in prev.parents.difference(&relations.parents) {
            self.graph.ensure_node(path).parents.remove(removed);
            if let Some(counterpart) = self.graph.node_mut(removed) {
                counterpart.children.remove(path);
                queue.push_back((removed.clone(), None));
            }
        }
        for removed in prev.children.difference(&relations.children) {
            self.graph.ensure_node(path).children.remove(removed);
            if let Some(counterpart) = self.graph.node_mut(removed) {
                counterpart.parents.remove(path);
                queue.push_back((removed.clone(), None));
            }
        }
        for removed in prev.related.difference(&relations.related) {
            self.graph.ensure_node(path).related_direct.remove(removed);
            if let Some(counterpart) = self.graph.node_mut(removed) {
                counterpart.related_direct.remove(path);
                queue.push_back((removed.clone(), None));
            }
        }

        // Parent edges.
        for added in relations.parents.difference(&prev.parents) {
            if !known_paths.contains(added) {
                state
                    .diagnostics
                    .push(SyncDiagnostic::dangling(path, &config.parent_property, added));
                // Kept as a forward reference only; no inverse to create.
                self.graph.ensure_node(path).parents.insert(added.clone());
                continue;
            }
            if self.graph.would_create_cycle(path, added) {
                state.diagnostics.push(SyncDiagnostic::cyclic(path, added));
                tracing::debug!("[engine] Rejected cycle-forming parent edge {path} -> {added}");
                continue;
            }
            self.graph.ensure_node(path).parents.insert(added.clone());
            self.graph.ensure_node(added).children.insert(path.clone());
            queue.push_back((added.clone(), None));
        }

        // Child edges: the cycle pre-check runs with the roles swapped, the
        // prospective child's declared chain must not already contain this
        // node.
        for added in relations.children.difference(&prev.children) {
            if !known_paths.contains(added) {
                state.diagnostics.push(SyncDiagnostic::dangling(
                    path,
                    &config.children_property,
                    added,
                ));
                self.graph.ensure_node(path).children.insert(added.clone());
                continue;
            }
            if self.graph.would_create_cycle(added, path) {
                state.diagnostics.push(SyncDiagnostic::cyclic(added, path));
                tracing::debug!("[engine] Rejected cycle-forming child edge {path} -> {added}");
                continue;
            }
            self.graph.ensure_node(path).children.insert(added.clone());
            self.graph.ensure_node(added).parents.insert(path.clone());
            queue.push_back((added.clone(), None));
        }

        // Related edges, symmetric.
        for added in relations.related.difference(&prev.related) {
            if derived.contains(added) {
                continue;
            }
            if !known_paths.contains(added) {
                state.diagnostics.push(SyncDiagnostic::dangling(
                    path,
                    &config.related_property,
                    added,
                ));
                self.graph
                    .ensure_node(path)
                    .related_direct
                    .insert(added.clone());
                continue;
            }
            self.graph
                .ensure_node(path)
                .related_direct
                .insert(added.clone());
            self.graph
                .ensure_node(added)
                .related_direct
                .insert(path.clone());
            queue.push_back((added.clone(), None));
        }
    }

    /// Step 7: after convergence, resolve parents, run sibling inference and
    /// the assignor over all touched nodes, then produce the write-back plan.
    fn finish_pass(&mut self, mut state: PassState, config: &SyncConfig) -> ReconcilePass {
        // Parent resolution for touched nodes, tracking old and new resolved
        // parents so sibling groups on both sides get recomputed.
        for path in state.touched.clone() {
            let Some(node) = self.graph.node(&path) else {
                continue;
            };
            let (resolved, diag) =
                resolve_parent(&path, &node.parents, node.priority_marker.as_ref());
            if let Some(diag) = diag {
                state.diagnostics.push(diag);
            }
            if let Some(new) = resolved.clone() {
                state.parents_of_interest.insert(new);
            }
            if let Some(node) = self.graph.node_mut(&path) {
                if let Some(old) = node.resolved_parent.clone() {
                    state.parents_of_interest.insert(old);
                }
                node.resolved_parent = resolved;
            }
        }

        // Sibling-derived related edges. A touched node may have left its
        // group entirely, so its derived set is cleared up front; the group
        // rebuild restores it for nodes that still have co-children.
        let mut sibling_affected = BTreeSet::new();
        for path in &state.touched {
            if let Some(node) = self.graph.node_mut(path) {
                if !node.related_derived.is_empty() {
                    node.related_derived.clear();
                    sibling_affected.insert(path.clone());
                }
            }
        }
        if config.infer_siblings {
            sibling_affected.extend(SiblingInferrer::recompute(
                &mut self.graph,
                &state.parents_of_interest,
            ));
        } else {
            sibling_affected.extend(SiblingInferrer::clear(&mut self.graph));
        }
        state.touched.extend(sibling_affected);

        // Identifier and title assignment.
        for path in state.touched.clone() {
            let parent_name = self
                .graph
                .node(&path)
                .and_then(|n| n.resolved_parent.clone())
                .map(|p| p.display_name().to_string());
            if let Some(node) = self.graph.node_mut(&path) {
                assign_zettel_id(node);
                assign_title(node, parent_name.as_deref(), config);
            }
        }

        let plan = self.build_plan(&state.touched, config);
        tracing::debug!(
            "[engine] Pass touched {} node(s), {} write(s), {} diagnostic(s)",
            state.touched.len(),
            plan.len(),
            state.diagnostics.len()
        );
        ReconcilePass {
            plan,
            diagnostics: state.diagnostics,
            touched: state.touched,
        }
    }

    fn desired_view(node: &NodeState, config: &SyncConfig) -> PersistedView {
        PersistedView {
            parents: node.parents.clone(),
            children: node.children.clone(),
            related: node.related_all(),
            zettel_id: node.zettel_id.clone(),
            title: if config.titles_enabled_for(&node.path) {
                node.title.clone()
            } else {
                // Never touch the title property where derivation is off.
                None
            },
        }
    }

    fn build_plan(&self, touched: &BTreeSet<VaultPath>, config: &SyncConfig) -> WriteBackPlan {
        let mut plan = WriteBackPlan::default();
        for path in touched {
            let Some(node) = self.graph.node(path) else {
                continue;
            };
            let desired = Self::desired_view(node, config);
            let persisted = self.persisted.get(path).cloned().unwrap_or_default();
            let mut props = RawProperties::new();

            if desired.parents != persisted.parents {
                props.insert(
                    config.parent_property.clone(),
                    reference_list_value(&desired.parents),
                );
            }
            if desired.children != persisted.children {
                props.insert(
                    config.children_property.clone(),
                    reference_list_value(&desired.children),
                );
            }
            if desired.related != persisted.related {
                props.insert(
                    config.related_property.clone(),
                    reference_list_value(&desired.related),
                );
            }
            if desired.zettel_id != persisted.zettel_id {
                if let Some(id) = &desired.zettel_id {
                    props.insert(config.id_property.clone(), Value::String(id.to_string()));
                }
            }
            if config.titles_enabled_for(path) && desired.title != persisted.title {
                if let Some(title) = &desired.title {
                    props.insert(config.title_property.clone(), Value::String(title.clone()));
                }
            }

            if !props.is_empty() {
                plan.writes.insert(path.clone(), props);
            }
        }
        plan
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted shape of a reference set: a YAML sequence, or null to clear the
/// property when the set is empty.
fn reference_list_value(refs: &BTreeSet<VaultPath>) -> Value {
    if refs.is_empty() {
        Value::Null
    } else {
        Value::Sequence(
            refs.iter()
                .map(|p| Value::String(p.as_str().to_string()))
                .collect(),
        )
    }
}
