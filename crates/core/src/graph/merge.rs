use std::collections::btree_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pedigree::FlattenedPedigree;
use crate::types::{Depth, Position};

use super::ancestry::{EdgeKey, MergeRecord, MergedAncestryGraph};
use super::identity::{resolve_identity, NodeId};
use super::node::{AncestorNode, Appearance, ParentRole};

/// Why a parent edge was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// (child, role) already points at a different parent.
    ParentMismatch,
    /// The child resolved to the same node as its own parent.
    SelfParent,
    /// The parent is already the child's parent in the other role.
    SameParents,
}

/// A rejected parent-edge assertion. The first asserted edge is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConflict {
    pub kind: ConflictKind,
    pub child: NodeId,
    pub role: ParentRole,
    pub existing_parent: Option<NodeId>,
    pub rejected_parent: NodeId,
    pub source_id: String,
}

impl fmt::Display for EdgeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.existing_parent) {
            (ConflictKind::ParentMismatch, Some(existing)) => write!(
                f,
                "{}: {} of {} is {}, ignoring {}",
                self.source_id, self.role, self.child, existing, self.rejected_parent
            ),
            (ConflictKind::SameParents, _) => write!(
                f,
                "{}: {} is already the {} of {}, ignoring it as {}",
                self.source_id,
                self.rejected_parent,
                self.role.other(),
                self.child,
                self.role
            ),
            _ => write!(
                f,
                "{}: {} would be its own {}",
                self.source_id, self.child, self.role
            ),
        }
    }
}

/// Outcome of merging one pedigree. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub source_id: String,
    pub nodes_created: BTreeSet<NodeId>,
    pub nodes_reused: BTreeSet<NodeId>,
    pub appearances_added: usize,
    pub edges_asserted: usize,
    pub edges_added: usize,
    pub conflicts: Vec<EdgeConflict>,
}

impl MergeReport {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} nodes created, {} reused, {} new appearances, {} edges asserted ({} new), {} conflicts",
            self.source_id,
            self.nodes_created.len(),
            self.nodes_reused.len(),
            self.appearances_added,
            self.edges_asserted,
            self.edges_added,
            self.conflicts.len()
        )
    }
}

enum EdgeOutcome {
    Added,
    Present,
    Conflict(EdgeConflict),
}

impl MergedAncestryGraph {
    /// Fold a flattened pedigree into the graph.
    ///
    /// Each slot resolves to a node (created on first sight), gets an
    /// appearance recorded, and asserts edges to the slots of its sire and
    /// dam. Appearances are keyed by (source, depth, path), so merging the
    /// same pedigree again adds nothing while two lineage paths to one
    /// ancestor inside a pedigree still count twice.
    ///
    /// # Errors
    /// Returns [`StructuralValidation`](crate::AncestryError::StructuralValidation)
    /// if the pedigree is invalid; the graph is not touched in that case.
    pub fn merge(&mut self, pedigree: &FlattenedPedigree) -> Result<MergeReport> {
        pedigree.check()?;

        let source_id = pedigree.source_id.as_str();
        let mut report = MergeReport {
            source_id: source_id.to_string(),
            ..MergeReport::default()
        };
        let mut resolved: HashMap<(Depth, Position), NodeId> = HashMap::new();

        for slot in pedigree.all_slots() {
            let id = resolve_identity(slot, source_id);
            let node = match self.nodes.entry(id.clone()) {
                Entry::Occupied(entry) => {
                    if !report.nodes_created.contains(&id) {
                        report.nodes_reused.insert(id.clone());
                    }
                    let node = entry.into_mut();
                    node.absorb(slot);
                    node
                }
                Entry::Vacant(entry) => {
                    log::debug!(
                        "new node {} for slot {}/{}",
                        id,
                        slot.generation,
                        slot.position
                    );
                    report.nodes_created.insert(id.clone());
                    entry.insert(AncestorNode::from_slot(id.clone(), slot))
                }
            };

            let fresh = node.record(Appearance {
                source_id: source_id.to_string(),
                depth: slot.generation,
                path: slot.position,
            });
            if fresh {
                report.appearances_added += 1;
            }
            resolved.insert((slot.generation, slot.position), id);
        }

        for slot in pedigree.all_slots() {
            let child = &resolved[&(slot.generation, slot.position)];
            for (role, parent_slot) in [
                (ParentRole::Sire, slot.sire_slot()),
                (ParentRole::Dam, slot.dam_slot()),
            ] {
                let Some(parent) = resolved.get(&parent_slot) else {
                    continue;
                };
                report.edges_asserted += 1;
                match self.assert_edge(child, role, parent, source_id) {
                    EdgeOutcome::Added => report.edges_added += 1,
                    EdgeOutcome::Present => {}
                    EdgeOutcome::Conflict(conflict) => {
                        log::warn!("edge conflict: {}", conflict);
                        report.conflicts.push(conflict);
                    }
                }
            }
        }

        self.merge_log.push(MergeRecord {
            source_id: source_id.to_string(),
            merged_at: Utc::now(),
            slots_merged: pedigree.slots.len() + 1,
            nodes_created: report.nodes_created.len(),
            conflicts: report.conflicts.len(),
        });

        log::info!("merged {}", report);
        Ok(report)
    }

    fn assert_edge(
        &mut self,
        child: &NodeId,
        role: ParentRole,
        parent: &NodeId,
        source_id: &str,
    ) -> EdgeOutcome {
        if child == parent {
            return EdgeOutcome::Conflict(EdgeConflict {
                kind: ConflictKind::SelfParent,
                child: child.clone(),
                role,
                existing_parent: None,
                rejected_parent: parent.clone(),
                source_id: source_id.to_string(),
            });
        }

        let other_role = EdgeKey {
            child: child.clone(),
            role: role.other(),
        };
        if self.edges.get(&other_role) == Some(parent) {
            return EdgeOutcome::Conflict(EdgeConflict {
                kind: ConflictKind::SameParents,
                child: child.clone(),
                role,
                existing_parent: None,
                rejected_parent: parent.clone(),
                source_id: source_id.to_string(),
            });
        }

        let key = EdgeKey {
            child: child.clone(),
            role,
        };
        match self.edges.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(parent.clone());
                EdgeOutcome::Added
            }
            Entry::Occupied(entry) if entry.get() == parent => EdgeOutcome::Present,
            Entry::Occupied(entry) => EdgeOutcome::Conflict(EdgeConflict {
                kind: ConflictKind::ParentMismatch,
                child: child.clone(),
                role,
                existing_parent: Some(entry.get().clone()),
                rejected_parent: parent.clone(),
                source_id: source_id.to_string(),
            }),
        }
    }
}

/// Free-function form of [`MergedAncestryGraph::merge`].
pub fn merge(graph: &mut MergedAncestryGraph, pedigree: &FlattenedPedigree) -> Result<MergeReport> {
    graph.merge(pedigree)
}
