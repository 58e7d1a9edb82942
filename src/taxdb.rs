//src/taxdb.rs

use std::io::Read;
use std::path::Path;

use ahash::AHashMap;
use csv::{ReaderBuilder, Trim};

use crate::error::{Error, Result};
use crate::fasta::open_maybe_gz;
use crate::taxonomy::{Lineage, Rank};

/// Reference identifier -> lineage.
#[derive(Debug, Clone, Default)]
pub struct LineageDb {
    ident_to_lineage: AHashMap<String, Lineage>,
}

impl LineageDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one identifier. Identifiers must be unique.
    pub fn insert(&mut self, ident: impl Into<String>, lineage: Lineage) -> Result<()> {
        let ident = ident.into();
        if self.ident_to_lineage.contains_key(&ident) {
            return Err(Error::DuplicateIdentifier(ident));
        }
        self.ident_to_lineage.insert(ident, lineage);
        Ok(())
    }

    pub fn get(&self, ident: &str) -> Option<&Lineage> {
        self.ident_to_lineage.get(ident)
    }

    pub fn len(&self) -> usize {
        self.ident_to_lineage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ident_to_lineage.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Lineage)> {
        self.ident_to_lineage.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Reduce a sequence or signature name to its accession: the first
/// whitespace-separated token, cut at the first `.` (version suffix).
pub fn normalize_ident(name: &str) -> &str {
    let first = name.split_whitespace().next().unwrap_or("");
    first.split('.').next().unwrap_or(first)
}

fn csv_reader<R: Read>(reader: R, has_headers: bool) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Parses a lineage spreadsheet in the format:
/// ```text
/// ident,superkingdom,phylum,class,order,family,genus,species,strain
/// GCA_000123,Bacteria,Firmicutes,...
/// ```
/// The first column holds the identifier; rank columns are found by header
/// name and must start at superkingdom. Other columns are ignored.
pub fn read_lineage_csv<R: Read>(reader: R, source: &str) -> Result<LineageDb> {
    let mut rdr = csv_reader(reader, true);
    let header = rdr.headers()?.clone();
    if header.is_empty() {
        return Ok(LineageDb::new());
    }

    // column index for each rank present, in rank order
    let mut rank_columns = Vec::new();
    for rank in Rank::ALL {
        match header.iter().position(|h| h.eq_ignore_ascii_case(rank.as_str())) {
            Some(col) => rank_columns.push(col),
            None => break,
        }
    }
    if rank_columns.is_empty() {
        return Err(Error::MalformedRow {
            path: source.to_string(),
            line: 1,
            message: "header has no 'superkingdom' column".to_string(),
        });
    }

    let mut db = LineageDb::new();
    for result in rdr.records() {
        let record = result?;
        let first = record.get(0).unwrap_or("");
        if record.len() <= 1 && first.is_empty() {
            continue;
        }
        let ident = normalize_ident(first);
        if ident.is_empty() {
            return Err(Error::MalformedRow {
                path: source.to_string(),
                line: record.position().map_or(0, |p| p.line() as usize),
                message: "empty identifier".to_string(),
            });
        }

        let names = rank_columns.iter().map(|&col| record.get(col).unwrap_or(""));
        let lineage = Lineage::from_names(names)?;
        db.insert(ident, lineage)?;
    }

    log::info!("loaded {} tax assignments from {}", db.len(), source);
    Ok(db)
}

pub fn parse_lineage_csv<P: AsRef<Path>>(path: P) -> Result<LineageDb> {
    let path = path.as_ref();
    let reader = open_maybe_gz(path)?;
    read_lineage_csv(reader, &path.display().to_string())
}

/// Parses a headerless provided-lineages spreadsheet:
/// ```text
/// <genome_name>,<superkingdom>,<phylum>,...
/// ```
/// Rows with no lineage names are skipped.
pub fn read_provided_lineages<R: Read>(reader: R) -> Result<AHashMap<String, Lineage>> {
    let mut provided = AHashMap::new();
    for result in csv_reader(reader, false).records() {
        let record = result?;
        let genome = match record.get(0) {
            Some(name) if !name.is_empty() && record.len() >= 2 => name,
            _ => continue,
        };
        let lineage = Lineage::from_names(record.iter().skip(1))?;
        if lineage.is_empty() {
            continue;
        }
        provided.insert(genome.to_string(), lineage);
    }
    Ok(provided)
}

pub fn parse_provided_lineages<P: AsRef<Path>>(path: P) -> Result<AHashMap<String, Lineage>> {
    let provided = read_provided_lineages(open_maybe_gz(path.as_ref())?)?;
    log::info!("loaded {} provided lineages", provided.len());
    Ok(provided)
}
