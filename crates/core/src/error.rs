use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AncestryError {
    #[error("Structural validation failed: {0}")]
    StructuralValidation(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Stored graph at '{}' is corrupt: {reason}", path.display())]
    PersistenceCorruption { path: PathBuf, reason: String },

    #[error("Node '{0}' not found in merged graph")]
    UnknownNode(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AncestryError>;
