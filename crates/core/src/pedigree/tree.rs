use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::{Depth, Position, Year};

use super::slot::{AncestorSlot, FlattenedPedigree, Sex, SubjectKey};

/// A nested sire/dam tree, as handed over by a page parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedigreeTree {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<Year>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sire: Option<Box<PedigreeTree>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dam: Option<Box<PedigreeTree>>,
}

impl PedigreeTree {
    pub fn leaf(name: &str) -> Self {
        Self {
            name: name.to_string(),
            external_id: None,
            registration_number: None,
            sex: None,
            birth_year: None,
            sire: None,
            dam: None,
        }
    }

    pub fn with_parents(mut self, sire: PedigreeTree, dam: PedigreeTree) -> Self {
        self.sire = Some(Box::new(sire));
        self.dam = Some(Box::new(dam));
        self
    }

    /// Number of generations below this node (a leaf has depth 0).
    pub fn depth(&self) -> Depth {
        let sire = self.sire.as_ref().map_or(0, |s| s.depth() + 1);
        let dam = self.dam.as_ref().map_or(0, |d| d.depth() + 1);
        sire.max(dam)
    }

    fn to_slot(&self, generation: Depth, position: Position) -> AncestorSlot {
        AncestorSlot {
            generation,
            position,
            name: self.name.clone(),
            external_id: self.external_id.clone(),
            registration_number: self.registration_number.clone(),
            sex: self.sex,
            birth_year: self.birth_year,
        }
    }
}

/// Flatten a nested tree into canonical slot order.
///
/// Traversal is breadth-first; the sire of position `p` lands at `2p - 1` and
/// the dam at `2p` of the next generation. Missing parents leave a hole, so
/// an incomplete tree produces a pedigree that fails validation.
///
/// The source id is the subject's external id or registration number when
/// known, otherwise the subject key.
pub fn flatten(tree: &PedigreeTree) -> FlattenedPedigree {
    let source_id = [&tree.external_id, &tree.registration_number]
        .into_iter()
        .filter_map(|id| id.as_deref().map(str::trim))
        .find(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| SubjectKey::new(&tree.name, tree.birth_year).to_string());

    let mut slots = Vec::new();
    let mut queue: VecDeque<(&PedigreeTree, Depth, Position)> = VecDeque::new();
    queue.push_back((tree, 0, 1));

    while let Some((node, generation, position)) = queue.pop_front() {
        if generation > 0 {
            slots.push(node.to_slot(generation, position));
        }
        if let Some(sire) = &node.sire {
            queue.push_back((&**sire, generation + 1, 2 * position - 1));
        }
        if let Some(dam) = &node.dam {
            queue.push_back((&**dam, generation + 1, 2 * position));
        }
    }

    // BFS already yields generation-major order; the sort keeps it canonical
    // when one branch is missing.
    slots.sort_by_key(|s| (s.generation, s.position));

    FlattenedPedigree {
        source_id,
        subject: tree.to_slot(0, 1),
        depth: tree.depth(),
        slots,
    }
}
