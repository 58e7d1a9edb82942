//src/refdb.rs

//! The reference oracle the classifier queries, and `SketchIndex`, an
//! exhaustive in-memory implementation over a small set of reference sketches
//! (typically the references a genome was already found to overlap).

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::sketch::HashSketch;
use crate::taxdb::LineageDb;
use crate::taxonomy::Lineage;

/// Best reference for a query and the number of hashes they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleMatch {
    pub ident: String,
    pub shared: u64,
}

/// Read-only lookup service over a reference sketch collection.
///
/// Implementations must be deterministic for a fixed collection. When several
/// references tie for best match the implementation decides which wins.
pub trait ReferenceOracle {
    /// Best-matching reference for `query`, or `None` if no reference shares
    /// at least the oracle's minimum number of hashes.
    fn best_match(&self, query: &HashSketch) -> Result<Option<OracleMatch>>;

    /// Lineage recorded for a reference identifier.
    fn lineage_of(&self, ident: &str) -> Result<Lineage>;

    /// The reference's own hash values.
    fn hashes_of(&self, ident: &str) -> Result<&HashSketch>;
}

#[derive(Debug, Clone)]
struct ReferenceSketch {
    ident: String,
    sketch: HashSketch,
}

/// Brute-force oracle: every query is compared against every reference.
/// Ties are broken by insertion order.
#[derive(Debug, Clone)]
pub struct SketchIndex {
    scale: u64,
    refs: Vec<ReferenceSketch>,
    by_ident: AHashMap<String, usize>,
    lineages: LineageDb,
    min_shared: u64,
}

impl SketchIndex {
    pub fn new(scale: u64, lineages: LineageDb) -> Self {
        Self {
            scale,
            refs: Vec::new(),
            by_ident: AHashMap::new(),
            lineages,
            min_shared: 1,
        }
    }

    /// Minimum shared hashes for a reference to be reported as a match.
    /// Values below 1 are treated as 1.
    pub fn with_min_shared(mut self, min_shared: u64) -> Self {
        self.min_shared = min_shared.max(1);
        self
    }

    pub fn scale(&self) -> u64 {
        self.scale
    }

    /// Add a reference sketch. The identifier must have a lineage and the
    /// sketch must share the index scale.
    pub fn insert(&mut self, ident: impl Into<String>, sketch: HashSketch) -> Result<()> {
        let ident = ident.into();
        if sketch.scale() != self.scale {
            return Err(Error::ScaleMismatch {
                expected: self.scale,
                found: sketch.scale(),
            });
        }
        if self.lineages.get(&ident).is_none() {
            return Err(Error::UnknownReference(ident));
        }
        if self.by_ident.contains_key(&ident) {
            return Err(Error::DuplicateIdentifier(ident));
        }
        self.by_ident.insert(ident.clone(), self.refs.len());
        self.refs.push(ReferenceSketch { ident, sketch });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// References whose hash content equals `genome`'s exactly.
    pub fn identical_to(&self, genome: &HashSketch) -> Vec<String> {
        self.refs
            .iter()
            .filter(|r| r.sketch.len() == genome.len() && r.sketch.similarity(genome) >= 1.0)
            .map(|r| r.ident.clone())
            .collect()
    }

    /// Find references whose hash content is identical to `genome` (the
    /// genome itself sitting in the reference collection) and drop them,
    /// unless that would leave the index empty. Returns the identical
    /// identifiers whether or not they were dropped.
    pub fn remove_identical(&mut self, genome: &HashSketch) -> Vec<String> {
        let identical = self.identical_to(genome);

        if identical.is_empty() {
            return identical;
        }
        if identical.len() == self.refs.len() {
            log::warn!(
                "all {} references are identical to the genome; keeping them",
                identical.len()
            );
            return identical;
        }

        for ident in &identical {
            log::info!("removing an identical match: {}", ident);
        }
        self.refs.retain(|r| !identical.contains(&r.ident));
        self.by_ident = self
            .refs
            .iter()
            .enumerate()
            .map(|(i, r)| (r.ident.clone(), i))
            .collect();
        identical
    }
}

impl ReferenceOracle for SketchIndex {
    fn best_match(&self, query: &HashSketch) -> Result<Option<OracleMatch>> {
        if query.scale() != self.scale {
            return Err(Error::ScaleMismatch {
                expected: self.scale,
                found: query.scale(),
            });
        }
        let mut best: Option<(usize, u64)> = None;
        for (i, r) in self.refs.iter().enumerate() {
            let shared = r.sketch.count_common(query) as u64;
            // strict '>' keeps the earliest reference on ties
            if shared > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((i, shared));
            }
        }
        Ok(best
            .filter(|&(_, shared)| shared >= self.min_shared)
            .map(|(i, shared)| OracleMatch {
                ident: self.refs[i].ident.clone(),
                shared,
            }))
    }

    fn lineage_of(&self, ident: &str) -> Result<Lineage> {
        self.lineages
            .get(ident)
            .cloned()
            .ok_or_else(|| Error::UnknownReference(ident.to_string()))
    }

    fn hashes_of(&self, ident: &str) -> Result<&HashSketch> {
        self.by_ident
            .get(ident)
            .map(|&i| &self.refs[i].sketch)
            .ok_or_else(|| Error::UnknownReference(ident.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    /// Build an index at scale 1000 from `(ident, lineage, hashes)` triples.
    pub fn index_from(refs: &[(&str, &str, Vec<u64>)]) -> SketchIndex {
        let mut lineages = LineageDb::new();
        for (ident, lin, _) in refs {
            lineages.insert(*ident, Lineage::parse(lin).unwrap()).unwrap();
        }
        let mut index = SketchIndex::new(1000, lineages);
        for (ident, _, hashes) in refs {
            index
                .insert(*ident, HashSketch::from_hashes(1000, hashes.iter().copied()))
                .unwrap();
        }
        index
    }
}
