//src/types.rs

use std::collections::BTreeMap;
use std::io;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::sketch::HashSketch;
use crate::taxonomy::Rank;

/// A minimal representation of a contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub name: String,
    pub seq: String,
}

/// One contig's hash content, with its sequence length for bp accounting.
#[derive(Debug, Clone)]
pub struct ContigSketch {
    pub name: String,
    pub length: u64,
    pub sketch: HashSketch,
}

/// A structured representation of the one-row genome summary.
#[derive(Debug, Clone, Serialize)]
pub struct GenomeSummaryRow {
    pub genome_name: String,
    pub lineage_short: String,
    pub lineage_full: String,
    pub match_rank: Rank,
    pub f_ident: f64,
    pub f_major: f64,
    /// Dirty contig counts keyed by the first rank of disagreement.
    pub dirty_reasons: BTreeMap<Rank, usize>,
    pub n_clean: usize,
    pub clean_bp: u64,
    pub n_dirty: usize,
    pub dirty_bp: u64,
    pub n_no_hash: usize,
    pub missed_bp: u64,
    pub n_no_ident: usize,
    pub no_ident_bp: u64,
    pub comment: String,
}

impl GenomeSummaryRow {
    pub const HEADER: &'static str = "genome,lineage_short,lineage,match_rank,f_ident,f_major,\
        dirty_reasons,n_clean,clean_bp,n_dirty,dirty_bp,n_no_hash,missed_bp,n_no_ident,no_ident_bp,comment";

    /// `phylum:1;genus:2` style rendering of `dirty_reasons`.
    pub fn dirty_reasons_text(&self) -> String {
        self.dirty_reasons
            .iter()
            .map(|(rank, n)| format!("{}:{}", rank, n))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Field values in `HEADER` order.
    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.genome_name.clone(),
            self.lineage_short.clone(),
            self.lineage_full.clone(),
            self.match_rank.to_string(),
            format!("{:.3}", self.f_ident),
            format!("{:.3}", self.f_major),
            self.dirty_reasons_text(),
            self.n_clean.to_string(),
            self.clean_bp.to_string(),
            self.n_dirty.to_string(),
            self.dirty_bp.to_string(),
            self.n_no_hash.to_string(),
            self.missed_bp.to_string(),
            self.n_no_ident.to_string(),
            self.no_ident_bp.to_string(),
            self.comment.clone(),
        ]
    }
}

/// Render a comma-separated header and rows as CSV text.
pub fn write_csv<I, R, F>(header: &str, rows: I) -> Result<String>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header.split(','))?;
    for row in rows {
        writer.write_record(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_csv_quoting() {
        let rows = vec![vec!["plain", "a,b"], vec!["say \"hi\"", ""]];
        let text = write_csv("x,y", rows).unwrap();
        assert_eq!(text, "x,y\nplain,\"a,b\"\n\"say \"\"hi\"\"\",\n");
    }

    #[test]
    fn test_summary_row_columns() {
        let mut dirty_reasons = BTreeMap::new();
        dirty_reasons.insert(Rank::Genus, 2);
        dirty_reasons.insert(Rank::Phylum, 1);
        let row = GenomeSummaryRow {
            genome_name: "g.fa".to_string(),
            lineage_short: "genus Shewanella".to_string(),
            lineage_full: "Bacteria;Proteobacteria".to_string(),
            match_rank: Rank::Genus,
            f_ident: 0.5,
            f_major: 0.8,
            dirty_reasons,
            n_clean: 10,
            clean_bp: 1000,
            n_dirty: 3,
            dirty_bp: 300,
            n_no_hash: 0,
            missed_bp: 0,
            n_no_ident: 1,
            no_ident_bp: 50,
            comment: String::new(),
        };
        assert_eq!(row.dirty_reasons_text(), "phylum:1;genus:2");
        let record = row.csv_record();
        assert_eq!(record.len(), GenomeSummaryRow::HEADER.split(',').count());
        let text = write_csv(GenomeSummaryRow::HEADER, [record]).unwrap();
        let line = text.lines().nth(1).unwrap();
        assert!(line.starts_with("g.fa,genus Shewanella,Bacteria;Proteobacteria,genus,0.500,0.800,"));
    }
}
