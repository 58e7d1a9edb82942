use rayon::prelude::*;

use super::classify_contig::{classify_contig, gather_contig_evidence, ContigDecision, ContigEvidence};
use super::classify_stats::GenomeStats;
use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::refdb::ReferenceOracle;
use crate::taxonomy::{Lineage, Rank};
use crate::types::ContigSketch;

/// Gather every contig of a genome in parallel. Each decomposition stays on
/// one thread; only whole contigs are spread over the pool.
///
/// Evidence does not depend on the match rank, so it can be computed once and
/// classified at several ranks.
pub fn gather_contigs<O>(
    contigs: &[ContigSketch],
    oracle: &O,
    config: &ClassifierConfig,
) -> Result<Vec<ContigEvidence>>
where
    O: ReferenceOracle + Sync + ?Sized,
{
    contigs
        .par_iter()
        .map(|c| gather_contig_evidence(&c.sketch, oracle, config))
        .collect()
}

/// Classify pre-gathered contigs at `match_rank`, returning one decision per
/// contig (input order) and the genome tallies.
pub fn classify_contigs(
    contigs: &[ContigSketch],
    evidence: &[ContigEvidence],
    genome_lineage: &Lineage,
    match_rank: Rank,
    config: &ClassifierConfig,
) -> (Vec<ContigDecision>, GenomeStats) {
    debug_assert_eq!(contigs.len(), evidence.len());

    contigs
        .par_iter()
        .zip(evidence.par_iter())
        .fold(
            || (Vec::with_capacity(64), GenomeStats::default()),
            |mut acc, (contig, ev)| {
                let decision = classify_contig(
                    &contig.name,
                    contig.length,
                    ev,
                    genome_lineage,
                    match_rank,
                    config,
                );
                acc.1.add(&decision);
                acc.0.push(decision);
                acc
            },
        )
        .reduce(
            || (Vec::new(), GenomeStats::default()),
            merge_partial_results,
        )
}

/// Gather and classify in one step.
pub fn gather_and_classify<O>(
    contigs: &[ContigSketch],
    oracle: &O,
    genome_lineage: &Lineage,
    match_rank: Rank,
    config: &ClassifierConfig,
) -> Result<(Vec<ContigDecision>, GenomeStats)>
where
    O: ReferenceOracle + Sync + ?Sized,
{
    let evidence = gather_contigs(contigs, oracle, config)?;
    Ok(classify_contigs(contigs, &evidence, genome_lineage, match_rank, config))
}

fn merge_partial_results(
    mut a: (Vec<ContigDecision>, GenomeStats),
    mut b: (Vec<ContigDecision>, GenomeStats),
) -> (Vec<ContigDecision>, GenomeStats) {
    a.0.append(&mut b.0);
    a.1.merge(b.1);
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_contig::ContigState;
    use crate::refdb::test_utils::index_from;
    use crate::sketch::HashSketch;

    const GENOME: &str = "Bacteria;Firmicutes;Clostridia;Oscillospirales;Acutalibacteraceae;Anaeromassilibacillus";
    const OTHER_PHYLUM: &str = "Bacteria;Proteobacteria;Gammaproteobacteria;Enterobacterales;Enterobacteriaceae;Escherichia";

    fn contig(name: &str, length: u64, hashes: impl IntoIterator<Item = u64>) -> ContigSketch {
        ContigSketch {
            name: name.to_string(),
            length,
            sketch: HashSketch::from_hashes(1000, hashes),
        }
    }

    #[test]
    fn test_all_agreeing_contigs_are_clean() {
        let index = index_from(&[("A", GENOME, (0..100).collect())]);
        let contigs: Vec<_> = (0..10)
            .map(|i| contig(&format!("c{}", i), 1000 + i, (i * 10)..(i * 10 + 10)))
            .collect();
        let lineage = Lineage::parse(GENOME).unwrap();
        let (decisions, stats) =
            gather_and_classify(&contigs, &index, &lineage, Rank::Genus, &ClassifierConfig::default()).unwrap();

        assert!(decisions.iter().all(|d| d.state == ContigState::Clean));
        assert_eq!(stats.n_clean, 10);
        assert_eq!(stats.dirty_bp, 0);
        // input order is kept
        let names: Vec<_> = decisions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8", "c9"]);
    }

    #[test]
    fn test_one_foreign_contig() {
        let index = index_from(&[
            ("A", GENOME, (0..50).collect()),
            ("E", OTHER_PHYLUM, (100..150).collect()),
        ]);
        let contigs = vec![
            contig("good", 5000, 0..50),
            contig("bad", 2500, 100..150),
            contig("tiny", 40, [500]),
        ];
        let lineage = Lineage::parse(GENOME).unwrap();
        let (decisions, stats) =
            gather_and_classify(&contigs, &index, &lineage, Rank::Genus, &ClassifierConfig::default()).unwrap();

        assert_eq!(decisions[1].state, ContigState::Dirty);
        assert_eq!(stats.dirty_bp, 2500);
        assert_eq!(stats.n_no_hash, 1);
        assert_eq!(stats.missed_bp, 40);
        assert_eq!(stats.dirty_reasons.get(&Rank::Phylum), Some(&1));
    }
}
