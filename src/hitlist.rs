//src/hitlist.rs

//! Rank-sweep contamination attribution and the cross-genome hit list.
//!
//! Contigs are classified at each rank from superkingdom down to the genome's
//! filter rank. A contig found dirty at a shallow rank is attributed there and
//! skipped at every deeper rank, so no contig is counted twice.

use rayon::prelude::*;
use serde::Serialize;

use crate::classify::classify_contig::{classify_contig, ContigEvidence};
use crate::classify::genome_lineage::GenomeLineageResult;
use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::taxonomy::{Lineage, Rank};
use crate::types::{write_csv, ContigSketch};

/// Ranks with their own hit list column.
pub const HIT_LIST_RANKS: [Rank; 6] = [
    Rank::Superkingdom,
    Rank::Phylum,
    Rank::Class,
    Rank::Order,
    Rank::Family,
    Rank::Genus,
];

/// Contigs newly found dirty at one rank of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankTally {
    pub rank: Rank,
    pub n_contigs: usize,
    pub bp: u64,
}

/// Result of sweeping one genome's contigs across ranks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankSweep {
    pub per_rank: Vec<RankTally>,
    /// Shallowest rank at which each contig (input order) was found dirty.
    pub attributed_at: Vec<Option<Rank>>,
}

impl RankSweep {
    pub fn total_bad_bp(&self) -> u64 {
        self.per_rank.iter().map(|t| t.bp).sum()
    }

    pub fn total_bad_contigs(&self) -> usize {
        self.per_rank.iter().map(|t| t.n_contigs).sum()
    }

    /// Bad bp attributed at `rank` or any shallower rank.
    pub fn cumulative_bp(&self, rank: Rank) -> u64 {
        self.per_rank
            .iter()
            .filter(|t| t.rank <= rank)
            .map(|t| t.bp)
            .sum()
    }
}

/// Sweep ranks superkingdom..=`filter_rank`, eliminating contigs as they are
/// found dirty.
pub fn sweep_ranks(
    contigs: &[ContigSketch],
    evidence: &[ContigEvidence],
    genome_lineage: &Lineage,
    filter_rank: Rank,
    config: &ClassifierConfig,
) -> RankSweep {
    debug_assert_eq!(contigs.len(), evidence.len());
    let mut attributed_at: Vec<Option<Rank>> = vec![None; contigs.len()];
    let mut per_rank = Vec::with_capacity(filter_rank.index() + 1);

    for rank in filter_rank.up_to() {
        let bad: Vec<usize> = (0..contigs.len())
            .into_par_iter()
            .filter(|&i| attributed_at[i].is_none())
            .filter(|&i| {
                let c = &contigs[i];
                classify_contig(&c.name, c.length, &evidence[i], genome_lineage, rank, config)
                    .state
                    .is_dirty()
            })
            .collect();

        let bp: u64 = bad.iter().map(|&i| contigs[i].length).sum();
        log::info!("   {}: {} contigs w/ {:.1}kb", rank, bad.len(), bp as f64 / 1000.0);
        for &i in &bad {
            attributed_at[i] = Some(rank);
        }
        per_rank.push(RankTally {
            rank,
            n_contigs: bad.len(),
            bp,
        });
    }

    RankSweep {
        per_rank,
        attributed_at,
    }
}

/// One hit list row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitListEntry {
    pub genome: String,
    /// Rank contamination was filtered at; `None` for unresolved genomes.
    pub filter_at: Option<Rank>,
    /// Manual override of `filter_at` for downstream cleaning.
    pub override_rank: Option<Rank>,
    pub total_bad_bp: u64,
    pub total_bad_contigs: usize,
    /// Cumulative bad bp through each of [`HIT_LIST_RANKS`].
    pub bad_bp_by_rank: [u64; 6],
    pub f_ident: f64,
    pub f_major: f64,
    pub lineage: Option<Lineage>,
    pub comment: String,
}

impl HitListEntry {
    /// Build the row for one genome from its lineage resolution and the
    /// rank sweep. Unresolved genomes are not swept.
    pub fn from_genome(
        genome: &str,
        contigs: &[ContigSketch],
        evidence: &[ContigEvidence],
        resolved: &GenomeLineageResult,
        config: &ClassifierConfig,
    ) -> Self {
        log::info!("examining {} for contamination:", genome);
        let sweep = match &resolved.lineage {
            Some(lineage) => sweep_ranks(contigs, evidence, lineage, resolved.match_rank, config),
            None => RankSweep::default(),
        };

        let mut bad_bp_by_rank = [0u64; 6];
        for (slot, rank) in bad_bp_by_rank.iter_mut().zip(HIT_LIST_RANKS) {
            *slot = sweep.cumulative_bp(rank);
        }
        log::info!(
            "   (total): {} contigs w/ {:.1}kb",
            sweep.total_bad_contigs(),
            sweep.total_bad_bp() as f64 / 1000.0
        );

        Self {
            genome: genome.to_string(),
            filter_at: resolved.lineage.as_ref().map(|_| resolved.match_rank),
            override_rank: None,
            total_bad_bp: sweep.total_bad_bp(),
            total_bad_contigs: sweep.total_bad_contigs(),
            bad_bp_by_rank,
            f_ident: resolved.f_ident,
            f_major: resolved.f_major,
            lineage: resolved.lineage.clone(),
            comment: resolved.comment.clone().unwrap_or_default(),
        }
    }

    /// Row for a genome whose processing failed outright.
    pub fn failed(genome: &str, comment: impl Into<String>) -> Self {
        Self {
            genome: genome.to_string(),
            filter_at: None,
            override_rank: None,
            total_bad_bp: 0,
            total_bad_contigs: 0,
            bad_bp_by_rank: [0; 6],
            f_ident: 0.0,
            f_major: 0.0,
            lineage: None,
            comment: comment.into(),
        }
    }

    pub fn with_override_rank(mut self, rank: Rank) -> Self {
        self.override_rank = Some(rank);
        self
    }

    /// Rank to clean at: the override if set, else `filter_at`.
    pub fn effective_rank(&self) -> Option<Rank> {
        self.override_rank.or(self.filter_at)
    }

    /// Field values in `HitList::HEADER` order.
    fn csv_record(&self) -> Vec<String> {
        let rank_text = |r: Option<Rank>| r.map(|r| r.to_string());
        let mut record = vec![
            self.genome.clone(),
            rank_text(self.filter_at).unwrap_or_else(|| "none".to_string()),
            rank_text(self.override_rank).unwrap_or_default(),
            self.total_bad_bp.to_string(),
        ];
        record.extend(self.bad_bp_by_rank.iter().map(|bp| bp.to_string()));
        record.push(format!("{:.3}", self.f_ident));
        record.push(format!("{:.3}", self.f_major));
        record.push(self.lineage.as_ref().map(|l| l.display()).unwrap_or_default());
        record.push(self.comment.clone());
        record
    }
}

/// Genomes ordered by contamination severity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HitList {
    entries: Vec<HitListEntry>,
}

impl HitList {
    pub const HEADER: &'static str = "genome,filter_at,override_filter_at,total_bad_bp,\
        superkingdom_bad_bp,phylum_bad_bp,class_bad_bp,order_bad_bp,family_bad_bp,genus_bad_bp,\
        f_ident,f_major,lineage,comment";

    /// Sort `entries` by `total_bad_bp`, largest first. Equal totals keep
    /// their input order.
    pub fn new(mut entries: Vec<HitListEntry>) -> Self {
        entries.sort_by(|a, b| b.total_bad_bp.cmp(&a.total_bad_bp));
        Self { entries }
    }

    pub fn entries(&self) -> &[HitListEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, genome: &str) -> Option<&HitListEntry> {
        self.entries.iter().find(|e| e.genome == genome)
    }

    /// Comma-separated text with a header row.
    pub fn to_csv(&self) -> Result<String> {
        write_csv(Self::HEADER, self.entries.iter().map(HitListEntry::csv_record))
    }
}
