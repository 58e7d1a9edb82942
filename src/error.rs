//src/error.rs

use thiserror::Error;

use crate::taxonomy::Rank;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors are input-contract violations or collaborator failures.
/// Insufficient evidence (no hashes, no identification, low `f_ident`)
/// is never reported through this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown taxonomic rank '{0}'")]
    UnknownRank(String),

    /// A lineage whose entries do not follow the rank order from superkingdom.
    #[error("malformed lineage: expected rank {expected} at position {position}, found {found}")]
    MalformedLineage {
        position: usize,
        expected: Rank,
        found: Rank,
    },

    #[error("lineage has an empty name at rank {0}")]
    EmptyLineageName(Rank),

    #[error("lineage has {0} names but the rank vocabulary only has 8")]
    TooManyNames(usize),

    #[error("no lineage recorded for reference '{0}'")]
    UnknownReference(String),

    #[error("duplicate identifier '{0}' in lineage table")]
    DuplicateIdentifier(String),

    #[error("{path}: line {line}: {message}")]
    MalformedRow {
        path: String,
        line: usize,
        message: String,
    },

    #[error("sketch scale mismatch: expected {expected}, found {found}")]
    ScaleMismatch { expected: u64, found: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
