use std::collections::BTreeMap;

use crate::error::Result;
use crate::graph::{MergedAncestryGraph, NodeId};
use crate::types::Depth;

/// Path multiplicity of every node reached at one depth.
///
/// A node reachable by two distinct edge paths at the same depth maps to 2.
/// Counts saturate at `u64::MAX`.
pub(crate) type Level<'g> = BTreeMap<&'g NodeId, u64>;

/// Expand the ancestry of `root` generation by generation.
///
/// Element `d - 1` of the result is the level at depth `d`. Every path is
/// followed independently, but paths are carried as counts per node rather
/// than as a list of occurrences, so the cost grows with the number of
/// distinct nodes per level instead of `2^depth`. A missing sire or dam ends
/// that branch. Levels past the last reachable generation are empty.
pub(crate) fn expand<'g>(
    graph: &'g MergedAncestryGraph,
    root: &'g NodeId,
    max_depth: Depth,
) -> Result<Vec<Level<'g>>> {
    graph.require(root)?;

    let mut levels = Vec::with_capacity(max_depth as usize);
    let mut current: Level<'g> = BTreeMap::from([(root, 1)]);

    for _ in 1..=max_depth {
        let mut next: Level<'g> = BTreeMap::new();
        for (&node, &paths) in &current {
            for (_, parent) in graph.parents(node) {
                let count = next.entry(parent).or_insert(0);
                *count = count.saturating_add(paths);
            }
        }
        levels.push(next.clone());
        current = next;
    }

    Ok(levels)
}
