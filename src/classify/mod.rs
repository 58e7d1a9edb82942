pub mod classify_contig;
pub mod classify_contigs;
pub mod classify_stats;
pub mod genome_lineage;

pub use classify_contig::{classify_contig, ContigDecision, ContigEvidence, ContigState, DecisionReason};
pub use classify_contigs::{classify_contigs, gather_and_classify, gather_contigs};
pub use classify_stats::GenomeStats;
pub use genome_lineage::{resolve_genome_lineage, GenomeLineageResult, ProvidedAgreement};
