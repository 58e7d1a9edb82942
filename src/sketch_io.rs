//src/sketch_io.rs

//! JSON loaders for reference sketches and per-contig genome sketches.
//! Files ending in `.gz` are decompressed on the fly.
//!
//! References:
//! ```text
//! {"scale": 1000, "references": [{"name": "GCA_000123.1 ...", "hashes": [..]}]}
//! ```
//! Genome:
//! ```text
//! {"name": "genome.fa", "scale": 1000,
//!  "contigs": [{"name": "contig_1", "length": 52000, "hashes": [..]}]}
//! ```

use std::io::Read;
use std::path::Path;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fasta::open_maybe_gz;
use crate::refdb::SketchIndex;
use crate::sketch::HashSketch;
use crate::taxdb::{normalize_ident, LineageDb};
use crate::types::ContigSketch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedHashes {
    pub name: String,
    pub hashes: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSketchFile {
    pub scale: u64,
    pub references: Vec<NamedHashes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContigHashes {
    pub name: String,
    pub length: u64,
    pub hashes: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeSketchFile {
    pub name: String,
    pub scale: u64,
    pub contigs: Vec<ContigHashes>,
}

/// A genome's contigs with their hash content.
#[derive(Debug, Clone)]
pub struct GenomeSketch {
    pub name: String,
    pub scale: u64,
    pub contigs: Vec<ContigSketch>,
}

impl GenomeSketch {
    /// Union of all contig sketches.
    pub fn whole_genome(&self) -> Result<HashSketch> {
        let mut whole = HashSketch::new(self.scale);
        for contig in &self.contigs {
            whole.merge(&contig.sketch)?;
        }
        Ok(whole)
    }

    pub fn contig(&self, name: &str) -> Option<&ContigSketch> {
        self.contigs.iter().find(|c| c.name == name)
    }

    pub fn total_length(&self) -> u64 {
        self.contigs.iter().map(|c| c.length).sum()
    }
}

impl TryFrom<GenomeSketchFile> for GenomeSketch {
    type Error = Error;

    fn try_from(file: GenomeSketchFile) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(file.contigs.len());
        let mut contigs = Vec::with_capacity(file.contigs.len());
        for c in file.contigs {
            if !seen.insert(c.name.clone()) {
                return Err(Error::DuplicateIdentifier(c.name));
            }
            contigs.push(ContigSketch {
                sketch: HashSketch::from_hashes(file.scale, c.hashes),
                name: c.name,
                length: c.length,
            });
        }
        Ok(GenomeSketch {
            name: file.name,
            scale: file.scale,
            contigs,
        })
    }
}

/// Build a `SketchIndex` from a reference sketch file. Reference names are
/// normalised to accessions before their lineage is looked up.
pub fn read_reference_index<R: Read>(reader: R, lineages: LineageDb) -> Result<SketchIndex> {
    let file: ReferenceSketchFile = serde_json::from_reader(reader)?;
    let mut index = SketchIndex::new(file.scale, lineages);
    for r in file.references {
        let ident = normalize_ident(&r.name).to_string();
        index.insert(ident, HashSketch::from_hashes(file.scale, r.hashes))?;
    }
    Ok(index)
}

pub fn load_reference_index<P: AsRef<Path>>(path: P, lineages: LineageDb) -> Result<SketchIndex> {
    let path = path.as_ref();
    let index = read_reference_index(open_maybe_gz(path)?, lineages)?;
    log::info!("loaded {} reference sketches from {}", index.len(), path.display());
    Ok(index)
}

pub fn read_genome_sketch<R: Read>(reader: R) -> Result<GenomeSketch> {
    let file: GenomeSketchFile = serde_json::from_reader(reader)?;
    GenomeSketch::try_from(file)
}

pub fn load_genome_sketch<P: AsRef<Path>>(path: P) -> Result<GenomeSketch> {
    let path = path.as_ref();
    let genome = read_genome_sketch(open_maybe_gz(path)?)?;
    log::debug!("loaded {} contig sketches for {}", genome.contigs.len(), genome.name);
    Ok(genome)
}
