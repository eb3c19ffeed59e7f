// Read-only analyses over the merged graph: generation summaries, influence
// scores, projections and age-gap checks.

pub mod age_gap;
pub mod projection;
pub mod scoring;
pub mod summary;
mod walk;

pub use age_gap::{age_gaps, classify_gap, AgeGap, GapClass};
pub use projection::{project_ancestry, Projection};
pub use scoring::{influence_table, score, InfluenceRow, ModelKind, ScoreModel, ScoringConfig};
pub use summary::{overview, summarize, GenerationSummary, LineageOverview};
