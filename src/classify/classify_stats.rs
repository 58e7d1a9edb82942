// src/classify/classify_stats.rs

use std::collections::BTreeMap;

use super::classify_contig::{ContigDecision, ContigState, DecisionReason};
use super::genome_lineage::GenomeLineageResult;
use crate::taxonomy::{Lineage, Rank};
use crate::types::GenomeSummaryRow;

/// Per-genome contig tallies. Every contig lands in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenomeStats {
    pub n_clean: usize,
    pub clean_bp: u64,
    pub n_dirty: usize,
    pub dirty_bp: u64,
    /// NoHash contigs
    pub n_no_hash: usize,
    pub missed_bp: u64,
    pub n_no_ident: usize,
    pub no_ident_bp: u64,
    /// Dirty contigs keyed by the shallowest rank of disagreement.
    pub dirty_reasons: BTreeMap<Rank, usize>,
}

impl GenomeStats {
    pub fn add(&mut self, decision: &ContigDecision) {
        match decision.state {
            ContigState::Clean => {
                self.n_clean += 1;
                self.clean_bp += decision.length;
            }
            ContigState::Dirty => {
                self.n_dirty += 1;
                self.dirty_bp += decision.length;
                if let DecisionReason::BestMatchDisagrees { rank } = decision.reason {
                    *self.dirty_reasons.entry(rank).or_insert(0) += 1;
                }
            }
            ContigState::NoHash => {
                self.n_no_hash += 1;
                self.missed_bp += decision.length;
            }
            ContigState::NoIdent => {
                self.n_no_ident += 1;
                self.no_ident_bp += decision.length;
            }
        }
    }

    pub fn merge(&mut self, other: GenomeStats) {
        self.n_clean += other.n_clean;
        self.clean_bp += other.clean_bp;
        self.n_dirty += other.n_dirty;
        self.dirty_bp += other.dirty_bp;
        self.n_no_hash += other.n_no_hash;
        self.missed_bp += other.missed_bp;
        self.n_no_ident += other.n_no_ident;
        self.no_ident_bp += other.no_ident_bp;
        for (rank, n) in other.dirty_reasons {
            *self.dirty_reasons.entry(rank).or_insert(0) += n;
        }
    }

    pub fn n_contigs(&self) -> usize {
        self.n_clean + self.n_dirty + self.n_no_hash + self.n_no_ident
    }

    pub fn total_bp(&self) -> u64 {
        self.clean_bp + self.dirty_bp + self.missed_bp + self.no_ident_bp
    }

    /// Build the one-row genome summary. An unresolved genome still gets a
    /// row, with an empty lineage and its failure comment.
    pub fn to_summary_row(&self, genome_name: &str, resolved: &GenomeLineageResult) -> GenomeSummaryRow {
        let lineage = resolved.lineage.clone().unwrap_or_else(Lineage::empty);
        GenomeSummaryRow {
            genome_name: genome_name.to_string(),
            lineage_short: lineage.display_short(),
            lineage_full: lineage.display(),
            match_rank: resolved.match_rank,
            f_ident: resolved.f_ident,
            f_major: resolved.f_major,
            dirty_reasons: self.dirty_reasons.clone(),
            n_clean: self.n_clean,
            clean_bp: self.clean_bp,
            n_dirty: self.n_dirty,
            dirty_bp: self.dirty_bp,
            n_no_hash: self.n_no_hash,
            missed_bp: self.missed_bp,
            n_no_ident: self.n_no_ident,
            no_ident_bp: self.no_ident_bp,
            comment: resolved.comment.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(state: ContigState, reason: DecisionReason, length: u64) -> ContigDecision {
        ContigDecision {
            name: "c".to_string(),
            length,
            state,
            reason,
            contig_lineage: None,
            total_hashes: 0,
            identified_hashes: 0,
            matched_hashes: 0,
            foreign: Vec::new(),
        }
    }

    #[test]
    fn test_add_and_merge() {
        let mut a = GenomeStats::default();
        a.add(&decision(ContigState::Clean, DecisionReason::AggregateAgrees, 100));
        a.add(&decision(ContigState::Dirty, DecisionReason::BestMatchDisagrees { rank: Rank::Phylum }, 50));

        let mut b = GenomeStats::default();
        b.add(&decision(ContigState::NoHash, DecisionReason::TooFewHashes, 7));
        b.add(&decision(ContigState::NoIdent, DecisionReason::NoMatch, 9));
        b.add(&decision(ContigState::Dirty, DecisionReason::BestMatchDisagrees { rank: Rank::Phylum }, 25));

        a.merge(b);
        assert_eq!(a.n_contigs(), 5);
        assert_eq!(a.dirty_bp, 75);
        assert_eq!(a.missed_bp, 7);
        assert_eq!(a.no_ident_bp, 9);
        assert_eq!(a.total_bp(), 191);
        assert_eq!(a.dirty_reasons.get(&Rank::Phylum), Some(&2));
    }
}
