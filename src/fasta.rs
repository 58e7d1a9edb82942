use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;
use crate::types::SequenceRecord;

fn is_gz(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Open a text file for buffered reading, transparently decompressing `.gz`.
pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn BufRead>> {
    let f = File::open(path)?;
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Minimal FASTA reader. The record name is the header up to the first
/// whitespace; multi-line sequences are joined.
pub fn read_fasta<R: BufRead>(mut reader: R) -> Result<Vec<SequenceRecord>> {
    let mut records = Vec::new();
    let mut current: Option<SequenceRecord> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if let Some(header) = trimmed.strip_prefix('>') {
            if let Some(done) = current.take() {
                records.push(done);
            }
            let name = header.split_whitespace().next().unwrap_or("").to_string();
            current = Some(SequenceRecord {
                name,
                seq: String::new(),
            });
        } else if let Some(rec) = current.as_mut() {
            rec.seq.push_str(trimmed.trim());
        }
        // sequence lines before the first header are ignored
    }
    if let Some(done) = current.take() {
        records.push(done);
    }
    Ok(records)
}

pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<SequenceRecord>> {
    read_fasta(open_maybe_gz(path.as_ref())?)
}

/// Destination for classified contigs.
pub trait SequenceSink {
    fn write(&mut self, name: &str, seq: &str) -> Result<()>;

    /// Flush and close the underlying stream.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SequenceSink for Vec<SequenceRecord> {
    fn write(&mut self, name: &str, seq: &str) -> Result<()> {
        self.push(SequenceRecord {
            name: name.to_string(),
            seq: seq.to_string(),
        });
        Ok(())
    }
}

/// FASTA writer over any `Write`.
pub struct FastaWriter<W: Write> {
    out: W,
}

impl<W: Write> FastaWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> SequenceSink for FastaWriter<W> {
    fn write(&mut self, name: &str, seq: &str) -> Result<()> {
        writeln!(self.out, ">{}\n{}", name, seq)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Gzip-compressed FASTA output; `finish` writes the gzip trailer.
pub struct GzFastaWriter {
    inner: Option<GzEncoder<BufWriter<File>>>,
}

impl SequenceSink for GzFastaWriter {
    fn write(&mut self, name: &str, seq: &str) -> Result<()> {
        if let Some(enc) = self.inner.as_mut() {
            writeln!(enc, ">{}\n{}", name, seq)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(enc) = self.inner.take() {
            enc.finish()?.flush()?;
        }
        Ok(())
    }
}

/// Create (truncating) a FASTA file, gzip-compressed when the path ends in `.gz`.
/// The file exists as soon as this returns, even if nothing is ever written.
pub fn create_fasta_sink<P: AsRef<Path>>(path: P) -> Result<Box<dyn SequenceSink>> {
    let path = path.as_ref();
    let out = BufWriter::new(File::create(path)?);
    let sink: Box<dyn SequenceSink> = if is_gz(path) {
        Box::new(GzFastaWriter {
            inner: Some(GzEncoder::new(out, Compression::default())),
        })
    } else {
        Box::new(FastaWriter::new(out))
    };
    Ok(sink)
}
