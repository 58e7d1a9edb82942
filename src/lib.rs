// src/lib.rs
pub mod classify;
pub mod config;
pub mod contam_map;
pub mod error;
pub mod fasta;
pub mod gather;
pub mod hitlist;
pub mod refdb;
pub mod sketch;
pub mod sketch_io;
pub mod taxdb;
pub mod taxonomy;
pub mod types;

use std::borrow::Cow;
use std::path::Path;

use ahash::AHashMap;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::classify::{
    classify_contigs, gather_contigs, resolve_genome_lineage, ContigDecision, ContigEvidence,
    ContigState, GenomeLineageResult, GenomeStats,
};
use crate::config::ClassifierConfig;
use crate::contam_map::{list_reference_matches, ContaminationMap, MatchReport};
use crate::error::Result;
use crate::fasta::SequenceSink;
use crate::hitlist::{HitList, HitListEntry};
use crate::refdb::SketchIndex;
use crate::sketch_io::{load_genome_sketch, GenomeSketch};
use crate::taxonomy::Lineage;
use crate::types::{write_csv, GenomeSummaryRow, SequenceRecord};

pub use crate::error::Error;

const CONTIG_REPORT_HEADER: &str =
    "name,length,decision_state,reason,contig_lineage,total_hashes,identified_hashes,matched_hashes";

/// Everything learned about one genome. Structured data only; text
/// artifacts are generated on demand.
#[derive(Debug, Clone)]
pub struct GenomeReport {
    pub genome_name: String,
    pub resolution: GenomeLineageResult,
    /// References with the same hash content as the whole genome.
    pub identical_refs: Vec<String>,
    /// One decision per contig sketch; empty when the genome is unresolved.
    pub decisions: Vec<ContigDecision>,
    pub stats: GenomeStats,
    pub evidence: Vec<ContigEvidence>,
}

impl GenomeReport {
    fn unresolved(genome_name: &str, resolution: GenomeLineageResult, identical_refs: Vec<String>) -> Self {
        Self {
            genome_name: genome_name.to_string(),
            resolution,
            identical_refs,
            decisions: Vec::new(),
            stats: GenomeStats::default(),
            evidence: Vec::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_resolved()
    }

    pub fn state_of(&self, contig: &str) -> Option<ContigState> {
        self.decisions.iter().find(|d| d.name == contig).map(|d| d.state)
    }

    /// Generate the contig report text on demand
    pub fn get_contig_report(&self) -> Result<String> {
        let rows = self.decisions.iter().map(|d| {
            vec![
                d.name.clone(),
                d.length.to_string(),
                d.state.to_string(),
                d.reason.code(),
                d.contig_lineage.as_ref().map(|l| l.display()).unwrap_or_default(),
                d.total_hashes.to_string(),
                d.identified_hashes.to_string(),
                d.matched_hashes.to_string(),
            ]
        });
        write_csv(CONTIG_REPORT_HEADER, rows)
    }

    pub fn get_contig_report_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.decisions)?)
    }

    pub fn summary_row(&self) -> GenomeSummaryRow {
        self.stats.to_summary_row(&self.genome_name, &self.resolution)
    }

    /// Generate the one-row genome summary text on demand
    pub fn get_genome_summary(&self) -> Result<String> {
        write_csv(GenomeSummaryRow::HEADER, [self.summary_row().csv_record()])
    }

    /// Per-reference match listing; `None` for an unresolved genome.
    pub fn match_report(&self, config: &ClassifierConfig) -> Option<MatchReport> {
        let lineage = self.resolution.lineage.as_ref()?;
        Some(list_reference_matches(
            &self.genome_name,
            lineage,
            &self.evidence,
            self.resolution.match_rank,
            config,
        ))
    }

    /// Contamination flowing into this genome at its match rank.
    pub fn contamination(&self) -> ContaminationMap {
        let mut map = ContaminationMap::new();
        if let Some(lineage) = &self.resolution.lineage {
            map.add_decisions(lineage, &self.decisions);
        }
        map
    }

    /// Hit list row from a rank sweep over `contigs`, which must be the
    /// contigs this report was built from.
    pub fn hit_list_entry(&self, contigs: &[types::ContigSketch], config: &ClassifierConfig) -> HitListEntry {
        HitListEntry::from_genome(&self.genome_name, contigs, &self.evidence, &self.resolution, config)
    }
}

/// Resolve the genome lineage and classify every contig.
///
/// References identical to the whole genome are taken to be the genome itself
/// and dropped from the search. Without a provided lineage such a genome
/// cannot be placed and is reported unresolved.
pub fn classify_genome(
    genome: &GenomeSketch,
    index: &SketchIndex,
    provided: Option<&Lineage>,
    config: &ClassifierConfig,
) -> Result<GenomeReport> {
    config.validate()?;
    let whole = genome.whole_genome()?;
    log::info!(
        "{}: {} contigs, {} hashes in genome",
        genome.name,
        genome.contigs.len(),
        whole.len()
    );

    let mut index = Cow::Borrowed(index);
    let identical = index.identical_to(&whole);
    if !identical.is_empty() {
        if provided.map_or(true, |l| l.is_empty()) {
            let comment = format!("found exact match: {}, but no provided lineage", identical.join(", "));
            log::warn!("{}", comment);
            let resolution = GenomeLineageResult {
                lineage: None,
                guessed: None,
                match_rank: config.match_rank,
                f_ident: 1.0,
                f_major: 1.0,
                comment: Some(comment),
                provided_agreement: None,
            };
            return Ok(GenomeReport::unresolved(&genome.name, resolution, identical));
        }
        index.to_mut().remove_identical(&whole);
    }

    let resolution = resolve_genome_lineage(&whole, &*index, provided, config)?;
    let lineage = match &resolution.lineage {
        Some(lineage) => lineage.clone(),
        None => return Ok(GenomeReport::unresolved(&genome.name, resolution, identical)),
    };

    let evidence = gather_contigs(&genome.contigs, &*index, config)?;
    let (decisions, stats) = classify_contigs(
        &genome.contigs,
        &evidence,
        &lineage,
        resolution.match_rank,
        config,
    );
    log::info!(
        "{}: {} clean ({} bp), {} dirty ({} bp), {} no_hash, {} no_ident",
        genome.name,
        stats.n_clean,
        stats.clean_bp,
        stats.n_dirty,
        stats.dirty_bp,
        stats.n_no_hash,
        stats.n_no_ident
    );

    Ok(GenomeReport {
        genome_name: genome.name.clone(),
        resolution,
        identical_refs: identical,
        decisions,
        stats,
        evidence,
    })
}

/// Counts written to each sink by [`partition_contigs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub n_clean: usize,
    pub clean_bp: u64,
    pub n_dirty: usize,
    pub dirty_bp: u64,
}

/// Route each sequence record to the clean or dirty sink by its decision.
/// Only `Dirty` contigs go to the dirty sink; a record with no contig sketch
/// counts as `NoHash`.
///
/// For an unresolved genome nothing is written unless `force` is set, in which
/// case every record goes to the clean sink. Both sinks are finished on every
/// path, so the outputs always exist.
pub fn partition_contigs<'a, I>(
    report: &GenomeReport,
    records: I,
    clean: &mut dyn SequenceSink,
    dirty: &mut dyn SequenceSink,
    force: bool,
) -> Result<PartitionSummary>
where
    I: IntoIterator<Item = &'a SequenceRecord>,
{
    let mut summary = PartitionSummary::default();
    let written = route_records(report, records, clean, dirty, force, &mut summary);
    let finished_clean = clean.finish();
    let finished_dirty = dirty.finish();
    written?;
    finished_clean?;
    finished_dirty?;
    log::info!("wrote {} clean bp, {} dirty bp", summary.clean_bp, summary.dirty_bp);
    Ok(summary)
}

fn route_records<'a, I>(
    report: &GenomeReport,
    records: I,
    clean: &mut dyn SequenceSink,
    dirty: &mut dyn SequenceSink,
    force: bool,
    summary: &mut PartitionSummary,
) -> Result<()>
where
    I: IntoIterator<Item = &'a SequenceRecord>,
{
    if !report.is_resolved() {
        if !force {
            log::warn!("{}: genome lineage unresolved; writing empty outputs", report.genome_name);
            return Ok(());
        }
        log::warn!("{}: genome lineage unresolved; not doing any cleaning", report.genome_name);
        for record in records {
            clean.write(&record.name, &record.seq)?;
            summary.n_clean += 1;
            summary.clean_bp += record.seq.len() as u64;
        }
        return Ok(());
    }

    let states: AHashMap<&str, ContigState> = report
        .decisions
        .iter()
        .map(|d| (d.name.as_str(), d.state))
        .collect();

    for record in records {
        let state = states.get(record.name.as_str()).copied().unwrap_or_else(|| {
            log::debug!("no sketch for contig {}; treating as no_hash", record.name);
            ContigState::NoHash
        });
        let bp = record.seq.len() as u64;
        if state.is_dirty() {
            dirty.write(&record.name, &record.seq)?;
            summary.n_dirty += 1;
            summary.dirty_bp += bp;
        } else {
            clean.write(&record.name, &record.seq)?;
            summary.n_clean += 1;
            summary.clean_bp += bp;
        }
    }
    Ok(())
}

/// Hit list and contamination map over a batch of genomes.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    pub hit_list: HitList,
    pub contamination: ContaminationMap,
}

fn hit_list_entry_for(
    genome: &GenomeSketch,
    index: &SketchIndex,
    provided: &AHashMap<String, Lineage>,
    config: &ClassifierConfig,
    contamination: &Mutex<ContaminationMap>,
) -> HitListEntry {
    match classify_genome(genome, index, provided.get(&genome.name), config) {
        Ok(report) => {
            contamination.lock().merge(report.contamination());
            report.hit_list_entry(&genome.contigs, config)
        }
        Err(e) => {
            log::warn!("{}: {}", genome.name, e);
            HitListEntry::failed(&genome.name, e.to_string())
        }
    }
}

/// Process genomes in parallel. A genome that fails gets a hit list row
/// carrying the error; the rest of the batch continues.
pub fn build_hit_list(
    genomes: &[GenomeSketch],
    index: &SketchIndex,
    provided: &AHashMap<String, Lineage>,
    config: &ClassifierConfig,
) -> BatchResults {
    let contamination = Mutex::new(ContaminationMap::new());
    let entries: Vec<HitListEntry> = genomes
        .par_iter()
        .map(|g| hit_list_entry_for(g, index, provided, config, &contamination))
        .collect();

    BatchResults {
        hit_list: HitList::new(entries),
        contamination: contamination.into_inner(),
    }
}

/// Like [`build_hit_list`], loading each genome sketch file on its worker.
/// Unreadable files become failed rows named after the file.
pub fn build_hit_list_from_files<P>(
    paths: &[P],
    index: &SketchIndex,
    provided: &AHashMap<String, Lineage>,
    config: &ClassifierConfig,
) -> BatchResults
where
    P: AsRef<Path> + Sync,
{
    let contamination = Mutex::new(ContaminationMap::new());
    let entries: Vec<HitListEntry> = paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            match load_genome_sketch(path) {
                Ok(genome) => hit_list_entry_for(&genome, index, provided, config, &contamination),
                Err(e) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    log::warn!("{}: {}", name, e);
                    HitListEntry::failed(&name, e.to_string())
                }
            }
        })
        .collect();

    BatchResults {
        hit_list: HitList::new(entries),
        contamination: contamination.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refdb::test_utils::index_from;
    use crate::sketch::HashSketch;
    use crate::taxonomy::Rank;
    use crate::types::ContigSketch;

    const GENOME: &str = "Bacteria;Firmicutes;Clostridia;Oscillospirales;Acutalibacteraceae;Anaeromassilibacillus;Anaeromassilibacillus sp.";
    const ECOLI: &str = "Bacteria;Proteobacteria;Gammaproteobacteria;Enterobacterales;Enterobacteriaceae;Escherichia;Escherichia coli";

    fn contig(name: &str, length: u64, hashes: impl IntoIterator<Item = u64>) -> ContigSketch {
        ContigSketch {
            name: name.to_string(),
            length,
            sketch: HashSketch::from_hashes(1000, hashes),
        }
    }

    fn record(name: &str, len: usize) -> SequenceRecord {
        SequenceRecord {
            name: name.to_string(),
            seq: "A".repeat(len),
        }
    }

    fn test_index() -> SketchIndex {
        index_from(&[
            ("A", GENOME, (0..200).collect()),
            ("E", ECOLI, (1000..1040).collect()),
        ])
    }

    fn contaminated_genome() -> GenomeSketch {
        GenomeSketch {
            name: "g1.fa".to_string(),
            scale: 1000,
            contigs: vec![
                contig("c1", 100_000, 0..100),
                contig("c2", 90_000, 100..180),
                contig("ecoli", 40_000, 1000..1040),
                contig("short", 500, [5000]),
            ],
        }
    }

    #[test]
    fn test_classify_genome() {
        let report = classify_genome(&contaminated_genome(), &test_index(), None, &ClassifierConfig::default()).unwrap();
        assert!(report.is_resolved());
        assert_eq!(report.state_of("c1"), Some(ContigState::Clean));
        assert_eq!(report.state_of("ecoli"), Some(ContigState::Dirty));
        assert_eq!(report.state_of("short"), Some(ContigState::NoHash));
        assert_eq!(report.stats.dirty_bp, 40_000);
        assert_eq!(report.stats.missed_bp, 500);

        let text = report.get_contig_report().unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("ecoli,40000,dirty,disagrees_at_phylum,"));

        let summary = report.get_genome_summary().unwrap();
        assert!(summary.lines().nth(1).unwrap().starts_with("g1.fa,genus Anaeromassilibacillus,"));

        let json = report.get_contig_report_json().unwrap();
        assert!(json.contains("\"state\": \"dirty\""));
    }

    #[test]
    fn test_partition_contigs() {
        let report = classify_genome(&contaminated_genome(), &test_index(), None, &ClassifierConfig::default()).unwrap();
        let records = vec![
            record("c1", 100),
            record("ecoli", 40),
            record("short", 5),
            record("unsketched", 7),
        ];
        let mut clean: Vec<SequenceRecord> = Vec::new();
        let mut dirty: Vec<SequenceRecord> = Vec::new();
        let summary = partition_contigs(&report, &records, &mut clean, &mut dirty, false).unwrap();

        assert_eq!(dirty.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["ecoli"]);
        assert_eq!(clean.len(), 3);
        assert_eq!(summary.dirty_bp, 40);
        assert_eq!(summary.clean_bp, 112);
    }

    #[test]
    fn test_unresolved_genome_writes_nothing() {
        // only 5 of 100 hashes identifiable
        let genome = GenomeSketch {
            name: "low.fa".to_string(),
            scale: 1000,
            contigs: vec![contig("c1", 1000, (0..5).chain(5000..5095))],
        };
        let report = classify_genome(&genome, &test_index(), None, &ClassifierConfig::default()).unwrap();
        assert!(!report.is_resolved());
        assert!(report.resolution.comment.as_ref().unwrap().contains("too few identifiable hashes"));

        let records = vec![record("c1", 10)];
        let mut clean: Vec<SequenceRecord> = Vec::new();
        let mut dirty: Vec<SequenceRecord> = Vec::new();
        partition_contigs(&report, &records, &mut clean, &mut dirty, false).unwrap();
        assert!(clean.is_empty());
        assert!(dirty.is_empty());

        let summary = partition_contigs(&report, &records, &mut clean, &mut dirty, true).unwrap();
        assert_eq!(summary.n_clean, 1);
        assert_eq!(clean.len(), 1);
    }

    #[test]
    fn test_unresolved_genome_creates_empty_files() {
        let genome = GenomeSketch {
            name: "low.fa".to_string(),
            scale: 1000,
            contigs: vec![contig("c1", 1000, 5000..5100)],
        };
        let report = classify_genome(&genome, &test_index(), None, &ClassifierConfig::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let clean_path = dir.path().join("clean.fa.gz");
        let dirty_path = dir.path().join("dirty.fa");
        let mut clean = fasta::create_fasta_sink(&clean_path).unwrap();
        let mut dirty = fasta::create_fasta_sink(&dirty_path).unwrap();
        partition_contigs(&report, &[record("c1", 10)], clean.as_mut(), dirty.as_mut(), false).unwrap();

        assert!(fasta::read_fasta_records(&clean_path).unwrap().is_empty());
        assert!(fasta::read_fasta_records(&dirty_path).unwrap().is_empty());
    }

    #[test]
    fn test_exact_match_without_provided_lineage() {
        let index = index_from(&[
            ("self", GENOME, (0..50).collect()),
            ("A", GENOME, (0..40).collect()),
        ]);
        let genome = GenomeSketch {
            name: "self.fa".to_string(),
            scale: 1000,
            contigs: vec![contig("c1", 1000, 0..50)],
        };
        let config = ClassifierConfig::default();

        let report = classify_genome(&genome, &index, None, &config).unwrap();
        assert!(!report.is_resolved());
        assert_eq!(report.identical_refs, vec!["self".to_string()]);
        assert!(report.resolution.comment.as_ref().unwrap().contains("found exact match: self"));

        let provided = Lineage::parse(GENOME).unwrap();
        let report = classify_genome(&genome, &index, Some(&provided), &config).unwrap();
        assert!(report.is_resolved());
        assert_eq!(report.state_of("c1"), Some(ContigState::Clean));
        let listing = report.match_report(&config).unwrap();
        assert!(listing.matches.contains_key("A"));
        assert!(!listing.matches.contains_key("self"));
    }

    #[test]
    fn test_build_hit_list() {
        let clean_genome = GenomeSketch {
            name: "clean.fa".to_string(),
            scale: 1000,
            contigs: vec![contig("c1", 50_000, 0..100)],
        };
        let bad_scale = GenomeSketch {
            name: "broken.fa".to_string(),
            scale: 10,
            contigs: vec![ContigSketch {
                name: "x".to_string(),
                length: 10,
                sketch: HashSketch::from_hashes(10, 0..10),
            }],
        };
        let genomes = vec![clean_genome, contaminated_genome(), bad_scale];
        let batch = build_hit_list(&genomes, &test_index(), &AHashMap::new(), &ClassifierConfig::default());

        let entries = batch.hit_list.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].genome, "g1.fa");
        assert_eq!(entries[0].total_bad_bp, 40_000);
        assert_eq!(entries[0].filter_at, Some(Rank::Genus));
        let broken = batch.hit_list.get("broken.fa").unwrap();
        assert_eq!(broken.filter_at, None);
        assert!(broken.comment.contains("scale mismatch"));

        let ecoli_genus = Lineage::parse(ECOLI).unwrap().truncate(Rank::Genus);
        let target = Lineage::parse(GENOME).unwrap().truncate(Rank::Genus);
        assert_eq!(batch.contamination.get(&ecoli_genus, &target), Some(40_000));
    }

    #[test]
    fn test_build_hit_list_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("g1.json");
        std::fs::write(
            &good,
            r#"{"name": "g1.fa", "scale": 1000, "contigs": [
                {"name": "c1", "length": 100000, "hashes": [0,1,2,3,4,5,6,7,8,9]},
                {"name": "e", "length": 4000, "hashes": [1000,1001,1002,1003]}
            ]}"#,
        )
        .unwrap();
        let missing = dir.path().join("missing.json");

        let batch = build_hit_list_from_files(
            &[good, missing],
            &test_index(),
            &AHashMap::new(),
            &ClassifierConfig::default(),
        );
        assert_eq!(batch.hit_list.len(), 2);
        assert_eq!(batch.hit_list.entries()[0].total_bad_bp, 4000);
        assert!(batch.hit_list.get("missing.json").unwrap().comment.contains("I/O error"));
    }
}
