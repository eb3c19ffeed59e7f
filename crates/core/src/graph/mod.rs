// Merged ancestry graph: identity resolution, merging and persistence.

pub mod ancestry;
pub mod identity;
pub mod merge;
pub mod node;
pub mod store;

pub use ancestry::{EdgeKey, MergeRecord, MergedAncestryGraph};
pub use identity::{normalize_name, resolve_identity, IdentityKind, NodeId};
pub use merge::{merge, ConflictKind, EdgeConflict, MergeReport};
pub use node::{AncestorNode, Appearance, ParentRole};
pub use store::{EdgeRecord, GraphStore};
