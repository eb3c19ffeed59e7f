use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{MergedAncestryGraph, NodeId};
use crate::types::Depth;

use super::walk::expand;

/// Ancestor counts for one generation of a subject's merged ancestry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub depth: Depth,
    /// Nodes whose shortest path from the root has length `depth`.
    pub unique_count: usize,
    /// Distinct nodes reached at any depth `<= depth`.
    pub cumulative_unique: usize,
    /// Distinct nodes at exactly `depth`, including ones also seen shallower.
    pub distinct_count: usize,
    /// Edge paths of length `depth`, counting repeats. Saturates at `u64::MAX`.
    pub appearance_count: u64,
}

impl GenerationSummary {
    /// Share of appearances at this depth that are repeats of a node already
    /// seen, 0.0 for an empty generation.
    pub fn repeat_ratio(&self) -> f64 {
        if self.appearance_count == 0 {
            return 0.0;
        }
        1.0 - self.unique_count as f64 / self.appearance_count as f64
    }
}

/// Per-generation unique and appearance counts from `root` up to `max_depth`.
///
/// Always returns `max_depth` entries; generations beyond the recorded
/// ancestry report zeros.
///
/// # Errors
/// Returns [`UnknownNode`](crate::AncestryError::UnknownNode) if `root` is not
/// in the graph.
pub fn summarize(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Depth,
) -> Result<Vec<GenerationSummary>> {
    let levels = expand(graph, root, max_depth)?;
    let mut seen: BTreeSet<&NodeId> = BTreeSet::from([root]);

    let summaries = levels
        .iter()
        .zip(1..)
        .map(|(level, depth)| {
            let before = seen.len();
            seen.extend(level.keys().copied());
            GenerationSummary {
                depth,
                unique_count: seen.len() - before,
                cumulative_unique: seen.len() - 1,
                distinct_count: level.len(),
                appearance_count: level
                    .values()
                    .fold(0, |acc, &n| acc.saturating_add(n)),
            }
        })
        .collect();

    Ok(summaries)
}

/// Unique-ancestor overview of a subject's merged ancestry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageOverview {
    /// Distinct nodes reached, the root included.
    pub total_nodes: usize,
    /// Deepest generation reached.
    pub max_generation: Depth,
    /// Reached nodes with exactly one recorded parent.
    pub open_nodes: usize,
    /// Reached nodes with no recorded parents.
    pub closed_nodes: usize,
    /// Distinct nodes by shortest-path depth.
    pub by_generation: BTreeMap<Depth, usize>,
}

/// Breadth-first unique ancestor overview. `max_depth = None` walks the
/// whole recorded ancestry.
pub fn overview(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Option<Depth>,
) -> Result<LineageOverview> {
    graph.require(root)?;

    let mut dist: BTreeMap<&NodeId, Depth> = BTreeMap::from([(root, 0)]);
    let mut queue = VecDeque::from([(root, 0)]);

    while let Some((node, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        for (_, parent) in graph.parents(node) {
            if !dist.contains_key(parent) {
                dist.insert(parent, depth + 1);
                queue.push_back((parent, depth + 1));
            }
        }
    }

    let mut out = LineageOverview {
        total_nodes: dist.len(),
        ..LineageOverview::default()
    };
    for (node, depth) in &dist {
        *out.by_generation.entry(*depth).or_insert(0) += 1;
        out.max_generation = out.max_generation.max(*depth);
        match graph.parents(node).count() {
            0 => out.closed_nodes += 1,
            1 => out.open_nodes += 1,
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::{canonical_order, AncestorSlot, FlattenedPedigree};

    fn complete(source: &str, depth: Depth) -> FlattenedPedigree {
        FlattenedPedigree {
            source_id: source.to_string(),
            subject: AncestorSlot::new(0, 1, source).with_external_id(source),
            depth,
            slots: canonical_order(depth)
                .map(|(g, p)| {
                    AncestorSlot::new(g, p, "x")
                        .with_external_id(&format!("{}-{}-{}", source, g, p))
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_pedigree_counts_double_each_generation() {
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&complete("A", 4)).unwrap();

        let summary = summarize(&graph, &NodeId::external("A"), 6).unwrap();
        assert_eq!(summary.len(), 6);
        for s in &summary[..4] {
            let expected = 1usize << s.depth;
            assert_eq!(s.unique_count, expected);
            assert_eq!(s.appearance_count, expected as u64);
            assert_eq!(s.repeat_ratio(), 0.0);
        }
        for s in &summary[4..] {
            assert_eq!(s.unique_count, 0);
            assert_eq!(s.appearance_count, 0);
        }
        assert_eq!(summary[3].cumulative_unique, 30);
    }

    #[test]
    fn test_repeated_ancestor_counts_once_unique_twice_appearance() {
        let mut ped = complete("A", 2);
        // Paternal and maternal grandsire are one stallion.
        ped.slots[2].external_id = Some("shared".to_string());
        ped.slots[4].external_id = Some("shared".to_string());
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&ped).unwrap();

        let summary = summarize(&graph, &NodeId::external("A"), 2).unwrap();
        assert_eq!(summary[1].appearance_count, 4);
        assert_eq!(summary[1].unique_count, 3);
        assert_eq!(summary[1].distinct_count, 3);
        assert_eq!(summary[1].cumulative_unique, 5);
    }

    fn trio(subject: &str, sire: &str, dam: &str) -> FlattenedPedigree {
        FlattenedPedigree {
            source_id: subject.to_string(),
            subject: AncestorSlot::new(0, 1, subject).with_external_id(subject),
            depth: 1,
            slots: vec![
                AncestorSlot::new(1, 1, sire).with_external_id(sire),
                AncestorSlot::new(1, 2, dam).with_external_id(dam),
            ],
        }
    }

    #[test]
    fn test_parent_cycle_counts_saturate() {
        // Each of X, Y and Z has the other two as parents, so the number of
        // paths doubles with every generation.
        let mut graph = MergedAncestryGraph::new();
        for (subject, sire, dam) in [("X", "Y", "Z"), ("Y", "X", "Z"), ("Z", "X", "Y")] {
            let report = graph.merge(&trio(subject, sire, dam)).unwrap();
            assert!(!report.has_conflicts());
        }
        let root = NodeId::external("X");

        let summary = summarize(&graph, &root, 70).unwrap();
        assert_eq!(summary.len(), 70);
        assert_eq!(summary[9].appearance_count, 1024);
        assert_eq!(summary[63].appearance_count, u64::MAX);
        assert_eq!(summary[69].appearance_count, u64::MAX);
        assert_eq!(summary[69].cumulative_unique, 2);

        let config = crate::analysis::ScoringConfig::default();
        let rows =
            crate::analysis::influence_table(&graph, &root, 70, &config, None).unwrap();
        assert!(rows.iter().all(|r| r.count == u64::MAX));
        assert!(rows.iter().all(|r| r.exponential.is_finite()));
    }

    #[test]
    fn test_zero_depth_and_unknown_root() {
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&complete("A", 1)).unwrap();
        assert!(summarize(&graph, &NodeId::external("A"), 0).unwrap().is_empty());
        assert!(summarize(&graph, &NodeId::external("nobody"), 3).is_err());
    }

    #[test]
    fn test_overview_open_and_closed() {
        let mut graph = MergedAncestryGraph::new();
        graph.merge(&complete("A", 2)).unwrap();

        let all = overview(&graph, &NodeId::external("A"), None).unwrap();
        assert_eq!(all.total_nodes, 7);
        assert_eq!(all.max_generation, 2);
        assert_eq!(all.closed_nodes, 4);
        assert_eq!(all.open_nodes, 0);
        assert_eq!(all.by_generation[&2], 4);

        let cut = overview(&graph, &NodeId::external("A"), Some(1)).unwrap();
        assert_eq!(cut.total_nodes, 3);
        assert_eq!(cut.max_generation, 1);
        assert_eq!(cut.closed_nodes, 0);
    }
}
