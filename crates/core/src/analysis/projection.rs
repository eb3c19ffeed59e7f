use std::collections::{BTreeSet, VecDeque};

use indexmap::IndexMap;

use crate::error::Result;
use crate::graph::{MergedAncestryGraph, NodeId, ParentRole};
use crate::types::Depth;

/// The ancestors of one subject, cut at a fixed depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub root: NodeId,
    pub max_depth: Depth,
    /// Reached nodes with their shortest depth, in breadth-first order.
    pub nodes: IndexMap<NodeId, Depth>,
    /// Nodes at the cut whose own parents are recorded beyond it.
    pub has_more: BTreeSet<NodeId>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn depth_of(&self, id: &NodeId) -> Option<Depth> {
        self.nodes.get(id).copied()
    }

    /// Edges between projected nodes, as (child, role, parent).
    pub fn edges<'a>(
        &'a self,
        graph: &'a MergedAncestryGraph,
    ) -> impl Iterator<Item = (&'a NodeId, ParentRole, &'a NodeId)> + 'a {
        self.nodes
            .iter()
            .filter(move |(_, depth)| **depth < self.max_depth)
            .flat_map(move |(child, _)| {
                graph
                    .parents(child)
                    .filter(move |(_, parent)| self.nodes.contains_key(*parent))
                    .map(move |(role, parent)| (child, role, parent))
            })
    }
}

/// Project the merged graph onto the ancestry of `root` up to `max_depth`.
pub fn project_ancestry(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Depth,
) -> Result<Projection> {
    graph.require(root)?;

    let mut nodes: IndexMap<NodeId, Depth> = IndexMap::new();
    let mut has_more = BTreeSet::new();
    let mut queue = VecDeque::from([(root.clone(), 0)]);
    nodes.insert(root.clone(), 0);

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            if graph.parents(&id).next().is_some() {
                has_more.insert(id);
            }
            continue;
        }
        for (_, parent) in graph.parents(&id) {
            if !nodes.contains_key(parent) {
                nodes.insert(parent.clone(), depth + 1);
                queue.push_back((parent.clone(), depth + 1));
            }
        }
    }

    Ok(Projection {
        root: root.clone(),
        max_depth,
        nodes,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::{canonical_order, AncestorSlot, FlattenedPedigree};

    fn graph_of_depth(depth: Depth) -> MergedAncestryGraph {
        let ped = FlattenedPedigree {
            source_id: "R".to_string(),
            subject: AncestorSlot::new(0, 1, "Root").with_external_id("R"),
            depth,
            slots: canonical_order(depth)
                .map(|(g, p)| {
                    AncestorSlot::new(g, p, "x").with_external_id(&format!("{}.{}", g, p))
                })
                .collect(),
        };
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&ped).unwrap();
        graph
    }

    #[test]
    fn test_projection_cut_marks_has_more() {
        let graph = graph_of_depth(3);
        let proj = project_ancestry(&graph, &NodeId::external("R"), 2).unwrap();

        assert_eq!(proj.len(), 7);
        assert_eq!(proj.has_more.len(), 4);
        assert!(proj.has_more.contains(&NodeId::external("2.1")));
        assert_eq!(proj.depth_of(&NodeId::external("1.2")), Some(1));
        assert_eq!(proj.edges(&graph).count(), 6);
        // Breadth-first order: root, then generation 1.
        let order: Vec<&str> = proj.nodes.keys().take(3).map(|id| id.as_str()).collect();
        assert_eq!(order, vec!["ext:R", "ext:1.1", "ext:1.2"]);
    }

    #[test]
    fn test_projection_beyond_recorded_depth() {
        let graph = graph_of_depth(2);
        let proj = project_ancestry(&graph, &NodeId::external("R"), 5).unwrap();
        assert_eq!(proj.len(), 7);
        assert!(proj.has_more.is_empty());
    }
}
