use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pedigree::{AncestorSlot, Sex};
use crate::types::{Depth, Position, Year};

use super::identity::NodeId;

/// Which parent an edge points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRole {
    Sire,
    Dam,
}

impl ParentRole {
    pub const BOTH: [ParentRole; 2] = [ParentRole::Sire, ParentRole::Dam];

    pub fn other(self) -> ParentRole {
        match self {
            ParentRole::Sire => ParentRole::Dam,
            ParentRole::Dam => ParentRole::Sire,
        }
    }
}

impl fmt::Display for ParentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRole::Sire => write!(f, "sire"),
            ParentRole::Dam => write!(f, "dam"),
        }
    }
}

/// One occurrence of an ancestor in a source pedigree.
///
/// `path` is the slot position within generation `depth`, which encodes the
/// sire/dam route from the subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Appearance {
    pub source_id: String,
    pub depth: Depth,
    pub path: Position,
}

impl Appearance {
    /// Render the route from the subject as `S`/`D` steps, e.g. `"SDS"`.
    /// The subject's own appearance renders as an empty string.
    pub fn lineage(&self) -> String {
        let steps = (0..self.depth).rev().map(|bit| {
            if (self.path.saturating_sub(1) >> bit) & 1 == 0 {
                'S'
            } else {
                'D'
            }
        });
        steps.collect()
    }
}

/// A deduplicated ancestor in the merged graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorNode {
    pub id: NodeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<Year>,
    /// Shallowest depth this node was seen at, per source pedigree.
    #[serde(default)]
    pub min_depths: BTreeMap<String, Depth>,
    /// Every (source, depth, path) occurrence; exact repeats collapse.
    #[serde(default)]
    pub appearances: BTreeSet<Appearance>,
}

impl AncestorNode {
    pub(crate) fn from_slot(id: NodeId, slot: &AncestorSlot) -> Self {
        Self {
            id,
            name: slot.name.trim().to_string(),
            sex: slot.sex,
            birth_year: slot.birth_year,
            min_depths: BTreeMap::new(),
            appearances: BTreeSet::new(),
        }
    }

    /// Fill attributes this node does not know yet; never overwrite known ones.
    pub(crate) fn absorb(&mut self, slot: &AncestorSlot) {
        if self.name.is_empty() && !slot.name.trim().is_empty() {
            self.name = slot.name.trim().to_string();
        }
        match (self.sex, slot.sex) {
            (None, Some(sex)) => self.sex = Some(sex),
            (Some(known), Some(other)) if known != other => {
                log::warn!(
                    "{}: keeping sex {} over conflicting {} from slot {}/{}",
                    self.id,
                    known,
                    other,
                    slot.generation,
                    slot.position
                );
            }
            _ => {}
        }
        match (self.birth_year, slot.birth_year) {
            (None, Some(year)) => self.birth_year = Some(year),
            (Some(known), Some(other)) if known != other => {
                log::warn!(
                    "{}: keeping birth year {} over conflicting {} from slot {}/{}",
                    self.id,
                    known,
                    other,
                    slot.generation,
                    slot.position
                );
            }
            _ => {}
        }
    }

    /// Record an appearance. Returns `false` if it was already recorded.
    pub(crate) fn record(&mut self, appearance: Appearance) -> bool {
        let depth = self
            .min_depths
            .entry(appearance.source_id.clone())
            .or_insert(appearance.depth);
        *depth = (*depth).min(appearance.depth);
        self.appearances.insert(appearance)
    }

    pub fn appearance_count(&self) -> usize {
        self.appearances.len()
    }

    /// Distinct source pedigrees this node appears in.
    pub fn source_count(&self) -> usize {
        self.min_depths.len()
    }

    /// Human-facing label: name plus birth year when known.
    pub fn label(&self) -> String {
        match self.birth_year {
            Some(year) => format!("{} ({})", self.name, year),
            None => self.name.clone(),
        }
    }
}
