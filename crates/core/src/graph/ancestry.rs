use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AncestryError, Result};

use super::identity::{normalize_name, NodeId};
use super::node::{AncestorNode, ParentRole};

/// Key of a parent edge: one child can have at most one parent per role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub child: NodeId,
    pub role: ParentRole,
}

/// One entry of the merge log.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source_id: String,
    pub merged_at: DateTime<Utc>,
    pub slots_merged: usize,
    pub nodes_created: usize,
    pub conflicts: usize,
}

/// The cumulative, deduplicated ancestry graph.
///
/// Nodes are keyed by canonical identifier and edges by (child, role), so
/// the same real ancestor is one vertex no matter how many pedigrees or
/// lineage paths mention it. The graph is only mutated through
/// [`MergedAncestryGraph::merge`].
///
/// Equality is structural: node set, edge set and every appearance multiset
/// must match, while the merge log is compared without regard to order.
#[derive(Debug, Clone, Default)]
pub struct MergedAncestryGraph {
    pub(crate) nodes: BTreeMap<NodeId, AncestorNode>,
    pub(crate) edges: BTreeMap<EdgeKey, NodeId>,
    pub(crate) merge_log: Vec<MergeRecord>,
}

impl MergedAncestryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from stored parts, checking that every edge endpoint
    /// is a known node.
    pub(crate) fn from_parts(
        nodes: BTreeMap<NodeId, AncestorNode>,
        edges: BTreeMap<EdgeKey, NodeId>,
        merge_log: Vec<MergeRecord>,
    ) -> std::result::Result<Self, String> {
        for (key, parent) in &edges {
            if !nodes.contains_key(&key.child) {
                return Err(format!("edge from unknown node '{}'", key.child));
            }
            if !nodes.contains_key(parent) {
                return Err(format!(
                    "{} edge of '{}' points to unknown node '{}'",
                    key.role, key.child, parent
                ));
            }
        }
        Ok(Self {
            nodes,
            edges,
            merge_log,
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&AncestorNode> {
        self.nodes.get(id)
    }

    /// Like [`node`](Self::node) but fails with [`AncestryError::UnknownNode`].
    pub fn require(&self, id: &NodeId) -> Result<&AncestorNode> {
        self.nodes
            .get(id)
            .ok_or_else(|| AncestryError::UnknownNode(id.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &AncestorNode> {
        self.nodes.values()
    }

    pub fn parent(&self, child: &NodeId, role: ParentRole) -> Option<&NodeId> {
        self.edges.get(&EdgeKey {
            child: child.clone(),
            role,
        })
    }

    /// Recorded parents of `child` in sire, dam order.
    pub fn parents<'a>(
        &'a self,
        child: &'a NodeId,
    ) -> impl Iterator<Item = (ParentRole, &'a NodeId)> + 'a {
        ParentRole::BOTH
            .into_iter()
            .filter_map(move |role| self.parent(child, role).map(|p| (role, p)))
    }

    /// Every edge as (child, role, parent).
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, ParentRole, &NodeId)> {
        self.edges.iter().map(|(k, p)| (&k.child, k.role, p))
    }

    pub fn merge_log(&self) -> &[MergeRecord] {
        &self.merge_log
    }

    /// Nodes that only carry a synthetic identity.
    pub fn unresolved_nodes(&self) -> impl Iterator<Item = &AncestorNode> {
        self.nodes.values().filter(|n| !n.id.is_resolved())
    }

    /// Nodes whose normalized name matches `name`.
    pub fn find_by_name(&self, name: &str) -> Vec<&AncestorNode> {
        let wanted = normalize_name(name);
        self.nodes
            .values()
            .filter(|n| normalize_name(&n.name) == wanted)
            .collect()
    }

    fn sorted_log(&self) -> Vec<&MergeRecord> {
        let mut log: Vec<&MergeRecord> = self.merge_log.iter().collect();
        log.sort();
        log
    }
}

impl PartialEq for MergedAncestryGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.edges == other.edges
            && self.sorted_log() == other.sorted_log()
    }
}

impl Eq for MergedAncestryGraph {}
