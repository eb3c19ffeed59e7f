// Flattened pedigree model, tree flattening and the read-through cache.

pub mod cache;
pub mod slot;
pub mod tree;

pub use cache::{CachedPedigree, PedigreeCache};
pub use slot::{canonical_order, AncestorSlot, FlattenedPedigree, Sex, SubjectKey};
pub use tree::{flatten, PedigreeTree};
