//! Canonical node identity.
//!
//! Every slot resolves to exactly one [`NodeId`], trying in order:
//!
//! 1. the external registry identifier, when present and not a placeholder;
//! 2. a derived key from the normalized name plus birth year (both required);
//! 3. a synthetic key unique to the slot's place in its source pedigree.
//!
//! Synthetic ids never collide with ids from any other slot, so ancestors we
//! cannot confidently identify stay disconnected instead of being merged by
//! guesswork. They are deterministic per (source, generation, position), which
//! keeps re-merging the same pedigree idempotent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pedigree::AncestorSlot;

const EXTERNAL_PREFIX: &str = "ext:";
const DERIVED_PREFIX: &str = "key:";
const SYNTHETIC_PREFIX: &str = "syn:";

/// Values sources use in place of a missing identifier.
const PLACEHOLDERS: &[&str] = &["", "0", "?", "-", "unknown", "none", "null", "n/a", "na"];

/// How a node's identity was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    External,
    Derived,
    Unresolved,
}

/// Canonical identifier of a node in the merged graph.
///
/// The string form carries its kind as a prefix (`ext:`, `key:`, `syn:`),
/// which is also the persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn external(id: &str) -> Self {
        NodeId(format!("{}{}", EXTERNAL_PREFIX, id.trim()))
    }

    pub fn derived(name: &str, birth_year: i32) -> Self {
        NodeId(format!("{}{}#{}", DERIVED_PREFIX, normalize_name(name), birth_year))
    }

    pub fn synthetic(source_id: &str, generation: u32, position: u32) -> Self {
        NodeId(format!(
            "{}{}@{}.{}",
            SYNTHETIC_PREFIX, source_id, generation, position
        ))
    }

    pub fn kind(&self) -> IdentityKind {
        if self.0.starts_with(EXTERNAL_PREFIX) {
            IdentityKind::External
        } else if self.0.starts_with(DERIVED_PREFIX) {
            IdentityKind::Derived
        } else {
            IdentityKind::Unresolved
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.kind() != IdentityKind::Unresolved
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a user-supplied id. Bare values are taken as external ids.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        NodeId::try_from(s.to_string()).unwrap_or_else(|_| NodeId::external(s))
    }
}

impl TryFrom<String> for NodeId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let known = [EXTERNAL_PREFIX, DERIVED_PREFIX, SYNTHETIC_PREFIX]
            .iter()
            .any(|p| s.starts_with(p) && s.len() > p.len());
        if known {
            Ok(NodeId(s))
        } else {
            Err(format!("node id '{}' has no identity prefix", s))
        }
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, collapse internal whitespace and uppercase.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Return a usable external id, or `None` for missing/placeholder values.
pub fn usable_external_id(raw: Option<&str>) -> Option<&str> {
    let id = raw?.trim();
    let placeholder = PLACEHOLDERS.iter().any(|p| id.eq_ignore_ascii_case(p));
    (!placeholder).then_some(id)
}

/// Resolve the canonical identifier of a slot from `source_id`.
pub fn resolve_identity(slot: &AncestorSlot, source_id: &str) -> NodeId {
    let external = usable_external_id(slot.external_id.as_deref())
        .or_else(|| usable_external_id(slot.registration_number.as_deref()));
    if let Some(id) = external {
        return NodeId::external(id);
    }
    let name = normalize_name(&slot.name);
    match slot.birth_year {
        Some(year) if !name.is_empty() => NodeId::derived(&name, year),
        _ => NodeId::synthetic(source_id, slot.generation, slot.position),
    }
}
