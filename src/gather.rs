//src/gather.rs

//! Greedy set-cover ("gather") decomposition of a hash sketch against a
//! reference oracle.
//!
//! Each round asks the oracle for the best reference against the hashes not
//! yet explained, credits the shared hashes to that reference, and removes
//! the reference's hashes from the working set. Near-duplicate references
//! therefore cannot claim the same hashes twice, and the loop ends because the
//! working set shrinks every round.

use ahash::AHashMap;

use crate::error::Result;
use crate::refdb::ReferenceOracle;
use crate::sketch::HashSketch;
use crate::taxonomy::{Lineage, Rank};

/// One round of the decomposition, before any rank aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHit {
    pub ident: String,
    pub lineage: Lineage,
    /// Hashes newly explained by this reference.
    pub count: u64,
}

/// Hash count explained by one lineage at the requested rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherMatch {
    pub lineage: Lineage,
    pub count: u64,
}

/// Run the greedy decomposition and return every reference hit in the order
/// the oracle produced them. The caller's sketch is not modified.
pub fn gather_references<O>(query: &HashSketch, oracle: &O) -> Result<Vec<ReferenceHit>>
where
    O: ReferenceOracle + ?Sized,
{
    let mut hits = Vec::new();
    if query.is_empty() {
        return Ok(hits);
    }

    let mut working = query.clone();
    while !working.is_empty() {
        let Some(best) = oracle.best_match(&working)? else {
            break;
        };
        let lineage = oracle.lineage_of(&best.ident)?;
        let removed = working.remove_many(oracle.hashes_of(&best.ident)?) as u64;
        if removed == 0 {
            // an oracle reporting a match it cannot explain would loop forever
            log::warn!(
                "reference {} reported {} shared hashes but explains none; stopping gather",
                best.ident,
                best.shared
            );
            break;
        }
        debug_assert_eq!(removed, best.shared);

        hits.push(ReferenceHit {
            ident: best.ident,
            lineage,
            count: removed,
        });
    }

    Ok(hits)
}

/// Sum hit counts per lineage truncated to `rank`, most hashes first.
/// Lineages with equal counts keep the order in which they were first seen.
pub fn aggregate_at_rank(hits: &[ReferenceHit], rank: Rank) -> Vec<GatherMatch> {
    let mut slots: AHashMap<Lineage, usize> = AHashMap::with_capacity(hits.len());
    let mut matches: Vec<GatherMatch> = Vec::with_capacity(hits.len());

    for hit in hits {
        let lineage = hit.lineage.truncate(rank);
        match slots.get(&lineage) {
            Some(&slot) => matches[slot].count += hit.count,
            None => {
                slots.insert(lineage.clone(), matches.len());
                matches.push(GatherMatch {
                    lineage,
                    count: hit.count,
                });
            }
        }
    }

    // stable: ties stay in first-seen order
    matches.sort_by(|a, b| b.count.cmp(&a.count));
    matches
}

/// Gather `query` against `oracle` and aggregate the result at `rank`.
pub fn gather_at_rank<O>(query: &HashSketch, oracle: &O, rank: Rank) -> Result<Vec<GatherMatch>>
where
    O: ReferenceOracle + ?Sized,
{
    let hits = gather_references(query, oracle)?;
    Ok(aggregate_at_rank(&hits, rank))
}

/// Total hashes explained across all hits.
pub fn total_count(hits: &[ReferenceHit]) -> u64 {
    hits.iter().map(|h| h.count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refdb::test_utils::index_from;
    use crate::refdb::SketchIndex;
    use crate::taxdb::LineageDb;
    use proptest::prelude::*;

    #[test]
    fn test_empty_query() {
        let index = index_from(&[("A", "Bacteria", vec![1, 2, 3])]);
        let res = gather_at_rank(&HashSketch::new(1000), &index, Rank::Genus).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn test_hashes_are_not_double_counted() {
        // B contains all of A; once B is taken, A has nothing left to explain
        let index = index_from(&[
            ("A", "Bacteria;Firmicutes;Bacilli", (0..10).collect()),
            ("B", "Bacteria;Firmicutes;Clostridia", (0..12).collect()),
            ("C", "Bacteria;Proteobacteria", (100..104).collect()),
        ]);
        let q = HashSketch::from_hashes(1000, (0..12).chain(100..104).chain(500..503));
        let hits = gather_references(&q, &index).unwrap();

        let summary: Vec<(&str, u64)> = hits.iter().map(|h| (h.ident.as_str(), h.count)).collect();
        assert_eq!(summary, vec![("B", 12), ("C", 4)]);
        assert_eq!(total_count(&hits), 16);
        // caller's sketch untouched
        assert_eq!(q.len(), 19);
    }

    #[test]
    fn test_aggregate_sums_under_truncated_lineage() {
        let index = index_from(&[
            ("A", "Bacteria;Firmicutes;Bacilli", (0..10).collect()),
            ("B", "Bacteria;Firmicutes;Clostridia", (10..16).collect()),
            ("C", "Bacteria;Proteobacteria;Gammaproteobacteria", (20..32).collect()),
        ]);
        let q = HashSketch::from_hashes(1000, (0..16).chain(20..32));

        let at_phylum = gather_at_rank(&q, &index, Rank::Phylum).unwrap();
        assert_eq!(at_phylum.len(), 2);
        assert_eq!(at_phylum[0].lineage.display(), "Bacteria;Firmicutes");
        assert_eq!(at_phylum[0].count, 16);
        assert_eq!(at_phylum[1].count, 12);

        let at_class = gather_at_rank(&q, &index, Rank::Class).unwrap();
        let counts: Vec<u64> = at_class.iter().map(|m| m.count).collect();
        assert_eq!(counts, vec![12, 10, 6]);
    }

    #[test]
    fn test_aggregate_ties_keep_first_seen_order() {
        let hits = vec![
            ReferenceHit {
                ident: "x".into(),
                lineage: Lineage::parse("Bacteria;Zeta").unwrap(),
                count: 5,
            },
            ReferenceHit {
                ident: "y".into(),
                lineage: Lineage::parse("Bacteria;Alpha").unwrap(),
                count: 5,
            },
        ];
        let agg = aggregate_at_rank(&hits, Rank::Phylum);
        assert_eq!(agg[0].lineage.display(), "Bacteria;Zeta");
    }

    proptest! {
        #[test]
        fn prop_gather_terminates_and_conserves(
            refs in prop::collection::vec(prop::collection::hash_set(0u64..200, 0..40), 0..8),
            query in prop::collection::hash_set(0u64..250, 0..120),
        ) {
            let mut lineages = LineageDb::new();
            for i in 0..refs.len() {
                lineages.insert(format!("r{i}"), Lineage::parse(&format!("Bacteria;P{}", i % 3)).unwrap()).unwrap();
            }
            let mut index = SketchIndex::new(1000, lineages);
            for (i, r) in refs.iter().enumerate() {
                index.insert(format!("r{i}"), HashSketch::from_hashes(1000, r.iter().copied())).unwrap();
            }
            let q = HashSketch::from_hashes(1000, query.iter().copied());

            let hits = gather_references(&q, &index).unwrap();
            prop_assert!(hits.len() <= refs.len());
            prop_assert!(hits.iter().all(|h| h.count > 0));
            prop_assert!(total_count(&hits) <= q.len() as u64);

            let agg = aggregate_at_rank(&hits, Rank::Phylum);
            prop_assert_eq!(agg.iter().map(|m| m.count).sum::<u64>(), total_count(&hits));
            prop_assert!(agg.windows(2).all(|w| w[0].count >= w[1].count));
        }
    }
}
