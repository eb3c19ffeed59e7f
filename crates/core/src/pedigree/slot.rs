use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AncestryError, Result};
use crate::graph::identity::normalize_name;
use crate::types::{slots_in_generation, slots_up_to, Depth, Position, Year, MAX_DEPTH};

/// Sex of an ancestor, when the source reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = AncestryError;

    /// Accepts the usual English and Scandinavian trotting-registry labels.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "stallion" | "colt" | "gelding" | "h" | "hingst" | "valack" => {
                Ok(Sex::Male)
            }
            "f" | "female" | "mare" | "filly" | "s" | "sto" => Ok(Sex::Female),
            other => Err(AncestryError::Parse(format!("Unknown sex label: '{}'", other))),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

/// Identity of the horse a pedigree was fetched for.
///
/// The name is normalized on construction, so `"Moe  Odin"` and
/// `"MOE ODIN"` are the same subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKey {
    name: String,
    year: Option<Year>,
}

impl SubjectKey {
    pub fn new(name: &str, year: Option<Year>) -> Self {
        Self {
            name: normalize_name(name),
            year,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn year(&self) -> Option<Year> {
        self.year
    }

    /// File-system safe stem: lowercase alphanumerics joined by `_`.
    pub fn file_stem(&self) -> String {
        let mut stem: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() {
                    c.to_lowercase().next().unwrap_or(c)
                } else {
                    '_'
                }
            })
            .collect();
        if let Some(year) = self.year {
            stem.push('_');
            stem.push_str(&year.to_string());
        }
        stem
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({})", self.name, year),
            None => write!(f, "{}", self.name),
        }
    }
}

/// One ancestor position in a flattened pedigree.
///
/// Position `p` in generation `g` has its sire at `2p - 1` and its dam at
/// `2p` in generation `g + 1`. The subject itself sits at generation 0,
/// position 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorSlot {
    pub generation: Depth,
    pub position: Position,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Registry number such as "T-275", used when `external_id` is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<Year>,
}

impl AncestorSlot {
    pub fn new(generation: Depth, position: Position, name: &str) -> Self {
        Self {
            generation,
            position,
            name: name.to_string(),
            external_id: None,
            registration_number: None,
            sex: None,
            birth_year: None,
        }
    }

    pub fn with_external_id(mut self, id: &str) -> Self {
        self.external_id = Some(id.to_string());
        self
    }

    pub fn with_registration_number(mut self, number: &str) -> Self {
        self.registration_number = Some(number.to_string());
        self
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn with_birth_year(mut self, year: Year) -> Self {
        self.birth_year = Some(year);
        self
    }

    /// (generation, position) of this slot's sire.
    pub fn sire_slot(&self) -> (Depth, Position) {
        (self.generation + 1, 2 * self.position - 1)
    }

    /// (generation, position) of this slot's dam.
    pub fn dam_slot(&self) -> (Depth, Position) {
        (self.generation + 1, 2 * self.position)
    }
}

/// A generation-indexed list of ancestor slots for one subject.
///
/// `slots` holds generations `1..=depth` in canonical order: generation
/// major, then position ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedPedigree {
    /// Identity of the source pedigree, used to key appearances.
    pub source_id: String,
    pub subject: AncestorSlot,
    pub depth: Depth,
    pub slots: Vec<AncestorSlot>,
}

impl FlattenedPedigree {
    pub fn subject_key(&self) -> SubjectKey {
        SubjectKey::new(&self.subject.name, self.subject.birth_year)
    }

    /// Look up a slot by generation and position. Generation 0 is the subject.
    pub fn slot(&self, generation: Depth, position: Position) -> Option<&AncestorSlot> {
        if generation == 0 {
            return (position == 1).then_some(&self.subject);
        }
        let index = slots_up_to(generation - 1).saturating_add(position.checked_sub(1)? as usize);
        self.slots
            .get(index)
            .filter(|s| s.generation == generation && s.position == position)
    }

    /// All slots of one generation, in position order.
    pub fn generation(&self, generation: Depth) -> &[AncestorSlot] {
        if generation == 0 || generation > self.depth {
            return &[];
        }
        let start = slots_up_to(generation - 1);
        let end = start
            .saturating_add(slots_in_generation(generation))
            .min(self.slots.len());
        self.slots.get(start..end).unwrap_or(&[])
    }

    /// Subject followed by every ancestor slot.
    pub fn all_slots(&self) -> impl Iterator<Item = &AncestorSlot> {
        std::iter::once(&self.subject).chain(self.slots.iter())
    }

    /// Check the generation/slot-count invariant.
    ///
    /// # Errors
    /// Returns [`AncestryError::StructuralValidation`] describing the first
    /// violation found.
    pub fn check(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(invalid("pedigree has an empty source id".to_string()));
        }
        if self.subject.generation != 0 || self.subject.position != 1 {
            return Err(invalid(format!(
                "subject must sit at generation 0 position 1, found {}/{}",
                self.subject.generation, self.subject.position
            )));
        }
        if self.subject.name.trim().is_empty() {
            return Err(invalid("subject has no name".to_string()));
        }
        if self.depth == 0 {
            return Err(invalid("pedigree has no ancestor generations".to_string()));
        }
        if self.depth > MAX_DEPTH {
            return Err(invalid(format!(
                "depth {} exceeds the supported maximum of {}",
                self.depth, MAX_DEPTH
            )));
        }

        let expected = slots_up_to(self.depth);
        if self.slots.len() != expected {
            return Err(invalid(format!(
                "depth {} requires {} slots, found {}",
                self.depth,
                expected,
                self.slots.len()
            )));
        }

        for (slot, (generation, position)) in self.slots.iter().zip(canonical_order(self.depth)) {
            if slot.generation != generation || slot.position != position {
                return Err(invalid(format!(
                    "expected slot {}/{} but found {}/{}",
                    generation, position, slot.generation, slot.position
                )));
            }
            if slot.name.trim().is_empty() {
                return Err(invalid(format!(
                    "slot {}/{} is not populated",
                    generation, position
                )));
            }
        }

        Ok(())
    }

    /// Whether the pedigree satisfies the structural invariant.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }
}

/// Every (generation, position) of a complete pedigree of `depth`, in
/// canonical order.
pub fn canonical_order(depth: Depth) -> impl Iterator<Item = (Depth, Position)> {
    (1..=depth).flat_map(|g| (1..=slots_in_generation(g) as Position).map(move |p| (g, p)))
}

fn invalid(msg: String) -> AncestryError {
    AncestryError::StructuralValidation(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(depth: Depth) -> FlattenedPedigree {
        let slots = canonical_order(depth)
            .map(|(g, p)| AncestorSlot::new(g, p, &format!("Horse {}-{}", g, p)))
            .collect();
        FlattenedPedigree {
            source_id: "subject".to_string(),
            subject: AncestorSlot::new(0, 1, "Subject"),
            depth,
            slots,
        }
    }

    #[test]
    fn test_complete_pedigree_validates() {
        for depth in 1..=5 {
            let ped = complete(depth);
            assert_eq!(ped.slots.len(), slots_up_to(depth));
            assert!(ped.validate(), "depth {} should validate", depth);
        }
    }

    #[test]
    fn test_missing_slot_rejected() {
        let mut ped = complete(3);
        ped.slots.pop();
        let msg = ped.check().unwrap_err().to_string();
        assert!(msg.contains("requires 14 slots"), "Error was: {}", msg);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut ped = complete(2);
        ped.slots.swap(2, 3);
        assert!(!ped.validate());
    }

    #[test]
    fn test_unpopulated_slot_rejected() {
        let mut ped = complete(2);
        ped.slots[4].name = "  ".to_string();
        let msg = ped.check().unwrap_err().to_string();
        assert!(msg.contains("not populated"), "Error was: {}", msg);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let ped = complete(0);
        assert!(!ped.validate());
    }

    #[test]
    fn test_oversized_depth_rejected() {
        for depth in [MAX_DEPTH + 1, 63, 64, Depth::MAX] {
            let ped = FlattenedPedigree {
                depth,
                slots: Vec::new(),
                ..complete(1)
            };
            let msg = ped.check().unwrap_err().to_string();
            assert!(msg.contains("supported maximum"), "Error was: {}", msg);
            assert!(ped.generation(depth).is_empty());
            assert!(ped.slot(depth, 1).is_none());
        }
    }

    #[test]
    fn test_slot_lookup_by_position() {
        let ped = complete(3);
        assert_eq!(ped.slot(0, 1).unwrap().name, "Subject");
        assert_eq!(ped.slot(2, 3).unwrap().name, "Horse 2-3");
        assert_eq!(ped.slot(3, 8).unwrap().name, "Horse 3-8");
        assert!(ped.slot(3, 9).is_none());
        assert!(ped.slot(4, 1).is_none());
        assert!(ped.slot(2, 0).is_none());
        assert_eq!(ped.generation(2).len(), 4);
        assert_eq!(ped.generation(4).len(), 0);
    }

    #[test]
    fn test_parent_slot_arithmetic() {
        let slot = AncestorSlot::new(2, 3, "X");
        assert_eq!(slot.sire_slot(), (3, 5));
        assert_eq!(slot.dam_slot(), (3, 6));
    }

    #[test]
    fn test_sex_labels() {
        assert_eq!("hingst".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!(" Sto ".parse::<Sex>().unwrap(), Sex::Female);
        assert_eq!("mare".parse::<Sex>().unwrap(), Sex::Female);
        assert!("unknown".parse::<Sex>().is_err());
    }

    #[test]
    fn test_subject_key_normalizes() {
        let a = SubjectKey::new("  Moe   odin (NO)", Some(1997));
        let b = SubjectKey::new("MOE ODIN (NO)", Some(1997));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "MOE ODIN (NO) (1997)");
        assert_eq!(a.file_stem(), "moe_odin__no__1997");
        assert_ne!(a, SubjectKey::new("MOE ODIN (NO)", None));
    }
}
