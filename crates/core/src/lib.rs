pub mod analysis;
pub mod error;
pub mod export;
pub mod graph;
pub mod pedigree;
pub mod types;

pub use error::{AncestryError, Result};
pub use graph::{GraphStore, MergedAncestryGraph, NodeId};
pub use pedigree::{FlattenedPedigree, PedigreeCache};
