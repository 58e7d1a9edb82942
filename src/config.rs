use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::taxonomy::Rank;

/// Thresholds for lineage resolution and contig classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Rank at which "same lineage" is judged.
    pub match_rank: Rank,
    /// Minimum hashes, both for a contig to be examined at all and for
    /// agreeing gather content to mark it clean.
    pub gather_min_matches: u64,
    /// A contig's best single reference must share at least this many hashes
    /// before a disagreement can mark it dirty.
    pub min_ident_hashes: u64,
    /// Minimum fraction of genome hashes identified by any reference.
    pub f_ident_threshold: f64,
    /// Minimum fraction of identified hashes in the major lineage.
    pub f_major_threshold: f64,
    /// Keep going on an unresolved genome by passing every contig through
    /// as clean instead of writing empty outputs.
    pub force: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            match_rank: Rank::Genus,
            gather_min_matches: 3,
            min_ident_hashes: 3,
            f_ident_threshold: 0.10,
            f_major_threshold: 0.20,
            force: false,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("f_ident_threshold", self.f_ident_threshold),
            ("f_major_threshold", self.f_major_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ClassifierConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
