use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AncestryError, Result};
use crate::graph::{MergedAncestryGraph, NodeId};
use crate::types::{Depth, Score, Year};

use super::walk::expand;

/// Name of a depth-decay model, as selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Linear,
    Exponential,
    SlowExponential,
    PowerLaw,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Linear,
        ModelKind::Exponential,
        ModelKind::SlowExponential,
        ModelKind::PowerLaw,
    ];
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Linear => "linear",
            ModelKind::Exponential => "exponential",
            ModelKind::SlowExponential => "slow-exponential",
            ModelKind::PowerLaw => "power-law",
        };
        f.write_str(name)
    }
}

impl FromStr for ModelKind {
    type Err = AncestryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "linear" | "lin" => Ok(ModelKind::Linear),
            "exponential" | "exp" => Ok(ModelKind::Exponential),
            "slow-exponential" | "exp-slow" | "slow" => Ok(ModelKind::SlowExponential),
            "power-law" | "power" => Ok(ModelKind::PowerLaw),
            other => Err(AncestryError::InvalidParameter(format!(
                "Unknown scoring model '{}'. \
                 Use linear, exponential, slow-exponential or power-law.",
                other
            ))),
        }
    }
}

/// A depth-decay weight function. Depth 1 is the root's parents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum ScoreModel {
    /// `(max_depth - d + 1) / max_depth`, floored at zero.
    Linear,
    /// `decay^d`.
    Exponential { decay: f64 },
    /// `decay^(d/2)`.
    SlowExponential { decay: f64 },
    /// `d^(-p)`.
    PowerLaw { p: f64 },
}

impl ScoreModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            ScoreModel::Linear => ModelKind::Linear,
            ScoreModel::Exponential { .. } => ModelKind::Exponential,
            ScoreModel::SlowExponential { .. } => ModelKind::SlowExponential,
            ScoreModel::PowerLaw { .. } => ModelKind::PowerLaw,
        }
    }

    /// # Errors
    /// Decay factors must lie in (0, 1) and the power-law exponent must be
    /// positive.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ScoreModel::Linear => Ok(()),
            ScoreModel::Exponential { decay } | ScoreModel::SlowExponential { decay } => {
                if decay > 0.0 && decay < 1.0 {
                    Ok(())
                } else {
                    Err(AncestryError::InvalidParameter(format!(
                        "{} decay must be in (0, 1), got {}",
                        self.kind(),
                        decay
                    )))
                }
            }
            ScoreModel::PowerLaw { p } => {
                if p > 0.0 && p.is_finite() {
                    Ok(())
                } else {
                    Err(AncestryError::InvalidParameter(format!(
                        "power-law exponent must be positive, got {}",
                        p
                    )))
                }
            }
        }
    }

    /// Weight of one occurrence at `depth`.
    pub fn weight(&self, depth: Depth, max_depth: Depth) -> Score {
        let d = depth as f64;
        match *self {
            ScoreModel::Linear => {
                if max_depth == 0 {
                    return 0.0;
                }
                let remaining = (max_depth as f64 - d + 1.0).max(0.0);
                remaining / max_depth as f64
            }
            ScoreModel::Exponential { decay } => decay.powf(d),
            ScoreModel::SlowExponential { decay } => decay.powf(d / 2.0),
            ScoreModel::PowerLaw { p } => d.powf(-p),
        }
    }
}

/// Default parameters for the configurable models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub exponential_decay: f64,
    pub slow_decay: f64,
    pub power_exponent: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            exponential_decay: 0.5,
            slow_decay: 0.5,
            power_exponent: 1.0,
        }
    }
}

impl ScoringConfig {
    pub fn model(&self, kind: ModelKind) -> ScoreModel {
        match kind {
            ModelKind::Linear => ScoreModel::Linear,
            ModelKind::Exponential => ScoreModel::Exponential {
                decay: self.exponential_decay,
            },
            ModelKind::SlowExponential => ScoreModel::SlowExponential {
                decay: self.slow_decay,
            },
            ModelKind::PowerLaw => ScoreModel::PowerLaw {
                p: self.power_exponent,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        ModelKind::ALL
            .iter()
            .try_for_each(|&kind| self.model(kind).validate())
    }
}

/// Influence score of every ancestor of `root` within `max_depth`.
///
/// Each (node, depth) occurrence on every distinct path contributes
/// `model.weight(depth)`, so an ancestor reached at depths 3 and 5 scores
/// `w(3) + w(5)`. The root itself is not scored. Only reached nodes appear.
///
/// # Errors
/// Fails on an invalid model or a root that is not in the graph.
pub fn score(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Depth,
    model: &ScoreModel,
) -> Result<BTreeMap<NodeId, Score>> {
    model.validate()?;
    let levels = expand(graph, root, max_depth)?;

    let mut scores: BTreeMap<NodeId, Score> = BTreeMap::new();
    for (level, depth) in levels.iter().zip(1..) {
        let w = model.weight(depth, max_depth);
        for (&node, &paths) in level {
            *scores.entry(node.clone()).or_insert(0.0) += w * paths as f64;
        }
    }
    Ok(scores)
}

/// One ancestor's appearance count and score under every model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluenceRow {
    pub id: NodeId,
    pub name: String,
    pub birth_year: Option<Year>,
    /// Occurrences within `max_depth`, counting every path.
    pub count: u64,
    /// Shallowest depth reached, `None` for an unreached focus node.
    pub min_depth: Option<Depth>,
    pub linear: Score,
    pub exponential: Score,
    pub slow_exponential: Score,
    pub power_law: Score,
}

/// All four model scores for the ancestors of `root`, highest exponential
/// score first.
///
/// With `focus`, only those nodes are reported; focus nodes that were not
/// reached still get a zero row when they exist in the graph.
pub fn influence_table(
    graph: &MergedAncestryGraph,
    root: &NodeId,
    max_depth: Depth,
    config: &ScoringConfig,
    focus: Option<&BTreeSet<NodeId>>,
) -> Result<Vec<InfluenceRow>> {
    config.validate()?;
    let levels = expand(graph, root, max_depth)?;
    let models = ModelKind::ALL.map(|kind| config.model(kind));

    let mut rows: BTreeMap<&NodeId, InfluenceRow> = BTreeMap::new();
    if let Some(focus) = focus {
        for id in focus {
            if let Some(node) = graph.node(id) {
                rows.insert(&node.id, empty_row(graph, &node.id));
            }
        }
    }

    for (level, depth) in levels.iter().zip(1..) {
        let weights = models.map(|m| m.weight(depth, max_depth));
        for (&node, &paths) in level {
            if focus.is_some_and(|f| !f.contains(node)) {
                continue;
            }
            let row = rows
                .entry(node)
                .or_insert_with(|| empty_row(graph, node));
            let paths_f = paths as f64;
            row.count = row.count.saturating_add(paths);
            row.min_depth = Some(row.min_depth.map_or(depth, |d| d.min(depth)));
            row.linear += weights[0] * paths_f;
            row.exponential += weights[1] * paths_f;
            row.slow_exponential += weights[2] * paths_f;
            row.power_law += weights[3] * paths_f;
        }
    }

    let mut table: Vec<InfluenceRow> = rows.into_values().collect();
    table.sort_by(|a, b| {
        b.exponential
            .partial_cmp(&a.exponential)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(table)
}

fn empty_row(graph: &MergedAncestryGraph, id: &NodeId) -> InfluenceRow {
    let node = graph.node(id);
    InfluenceRow {
        id: id.clone(),
        name: node.map(|n| n.name.clone()).unwrap_or_default(),
        birth_year: node.and_then(|n| n.birth_year),
        count: 0,
        min_depth: None,
        linear: 0.0,
        exponential: 0.0,
        slow_exponential: 0.0,
        power_law: 0.0,
    }
}
