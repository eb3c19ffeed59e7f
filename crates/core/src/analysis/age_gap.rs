use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{MergedAncestryGraph, NodeId, ParentRole};
use crate::types::{Depth, Year};

use super::projection::project_ancestry;

/// Plausibility class of a parent/offspring birth-year gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    Unknown,
    Impossible,
    VeryUnusual,
    Suspicious,
    Normal,
}

pub fn classify_gap(gap: Option<i32>) -> GapClass {
    match gap {
        None => GapClass::Unknown,
        Some(g) if g < 2 => GapClass::Impossible,
        Some(g) if g < 8 => GapClass::VeryUnusual,
        Some(g) if g > 30 => GapClass::Suspicious,
        Some(_) => GapClass::Normal,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeGap {
    pub child: NodeId,
    pub child_name: String,
    pub role: ParentRole,
    pub parent: Option<NodeId>,
    pub parent_name: Option<String>,
    pub child_birth_year: Option<Year>,
    pub parent_birth_year: Option<Year>,
    pub gap: Option<i32>,
    pub class: GapClass,
}

/// Sire and dam age gaps for every ancestor of `root` above the cut depth.
///
/// Both roles are reported for each child; a missing parent or birth year
/// yields [`GapClass::Unknown`].
pub fn age_gaps(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Depth,
) -> Result<Vec<AgeGap>> {
    let projection = project_ancestry(graph, root, max_depth)?;
    let mut gaps = Vec::new();

    for (id, &depth) in &projection.nodes {
        if depth >= max_depth {
            continue;
        }
        let child = graph.require(id)?;
        for role in ParentRole::BOTH {
            let parent = graph.parent(id, role).and_then(|p| graph.node(p));
            let parent_year = parent.and_then(|p| p.birth_year);
            let gap = child.birth_year.zip(parent_year).map(|(c, p)| c - p);
            gaps.push(AgeGap {
                child: id.clone(),
                child_name: child.name.clone(),
                role,
                parent: parent.map(|p| p.id.clone()),
                parent_name: parent.map(|p| p.name.clone()),
                child_birth_year: child.birth_year,
                parent_birth_year: parent_year,
                gap,
                class: classify_gap(gap),
            });
        }
    }

    Ok(gaps)
}
