//! FASTQ reading and compressed read-container writing.
//!
//! Reads are never collected in memory: callers stream records through
//! [`for_each_record`] and write them out with [`FastqWriter`].

use crate::{RegionplexError, Result};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A borrowed view of one FASTQ (or FASTA) record.
#[derive(Debug, Clone, Copy)]
pub struct ReadRecord<'a> {
    pub id: &'a [u8],
    pub seq: &'a [u8],
    pub qual: Option<&'a [u8]>,
}

impl<'a> ReadRecord<'a> {
    /// The read name up to the first whitespace, as aligners report it.
    pub fn name(&self) -> &'a [u8] {
        let end = self
            .id
            .iter()
            .position(|c| c.is_ascii_whitespace())
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Open a plain or gzip-compressed file, detected from its magic bytes.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| RegionplexError::input_access(path, e))?;
    let mut reader = BufReader::new(file);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Stream every record of a FASTQ/FASTA file. Returns the number of records.
pub fn for_each_record<F>(path: &Path, mut on_record: F) -> Result<u64>
where
    F: FnMut(ReadRecord<'_>) -> Result<()>,
{
    let mut reader = open_reader(path)?;
    // needletail rejects empty input; an empty container is a valid zero-read file
    if reader.fill_buf()?.is_empty() {
        return Ok(0);
    }

    let mut parser = needletail::parse_fastx_reader(reader)
        .map_err(|e| RegionplexError::Parse(format!("{}: {}", path.display(), e)))?;

    let mut count = 0u64;
    while let Some(record) = parser.next() {
        let record =
            record.map_err(|e| RegionplexError::Parse(format!("{}: {}", path.display(), e)))?;
        let seq = record.seq();
        on_record(ReadRecord {
            id: record.id(),
            seq: &seq,
            qual: record.qual(),
        })?;
        count += 1;
    }

    Ok(count)
}

pub fn count_records(path: &Path) -> Result<u64> {
    for_each_record(path, |_| Ok(()))
}

/// Read count and length summary of one read file.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadStats {
    pub reads: u64,
    pub total_bases: u64,
}

impl ReadStats {
    pub fn average_length(&self) -> Option<f64> {
        if self.reads == 0 {
            None
        } else {
            Some(self.total_bases as f64 / self.reads as f64)
        }
    }
}

pub fn read_stats(path: &Path) -> Result<ReadStats> {
    let mut total_bases = 0u64;
    let reads = for_each_record(path, |record| {
        total_bases += record.seq.len() as u64;
        Ok(())
    })?;
    Ok(ReadStats { reads, total_bases })
}

/// Gzip-compressed FASTQ writer.
///
/// Opening in append mode adds a new gzip member to the file; multi-member
/// files are read back transparently by [`open_reader`].
pub struct FastqWriter {
    path: PathBuf,
    encoder: GzEncoder<BufWriter<File>>,
    written: u64,
}

impl FastqWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Self::from_file(path, File::create(path)?)
    }

    pub fn append(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Self::from_file(path, file)
    }

    fn from_file(path: &Path, file: File) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            encoder: GzEncoder::new(BufWriter::new(file), Compression::default()),
            written: 0,
        })
    }

    pub fn write_record(&mut self, name: &[u8], seq: &[u8], qual: &[u8]) -> Result<()> {
        self.encoder.write_all(b"@")?;
        self.encoder.write_all(name)?;
        self.encoder.write_all(b"\n")?;
        self.encoder.write_all(seq)?;
        self.encoder.write_all(b"\n+\n")?;
        if qual.len() == seq.len() {
            self.encoder.write_all(qual)?;
        } else {
            // FASTA input or a '*' quality column: emit a neutral placeholder
            self.encoder.write_all(&vec![b'I'; seq.len()])?;
        }
        self.encoder.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush the gzip trailer and close the file.
    pub fn finish(self) -> Result<u64> {
        let mut inner = self.encoder.finish()?;
        inner.flush()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_stream_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq.gz");

        let mut writer = FastqWriter::create(&path).unwrap();
        writer.write_record(b"r1", b"ACGT", b"IIII").unwrap();
        writer.write_record(b"r2", b"ACGTAC", b"*").unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let mut names = Vec::new();
        let mut quals = Vec::new();
        let count = for_each_record(&path, |record| {
            names.push(String::from_utf8_lossy(record.name()).to_string());
            quals.push(String::from_utf8_lossy(record.qual.unwrap()).to_string());
            Ok(())
        })
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(names, vec!["r1", "r2"]);
        assert_eq!(quals, vec!["IIII", "IIIIII"]);
    }

    #[test]
    fn test_appended_members_are_all_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bucket.fastq.gz");

        let mut first = FastqWriter::create(&path).unwrap();
        first.write_record(b"a", b"AC", b"II").unwrap();
        first.finish().unwrap();

        let mut second = FastqWriter::append(&path).unwrap();
        second.write_record(b"b", b"GT", b"II").unwrap();
        second.finish().unwrap();

        assert_eq!(count_records(&path).unwrap(), 2);
    }

    #[test]
    fn test_empty_containers_have_zero_reads() {
        let dir = TempDir::new().unwrap();
        let plain = dir.path().join("empty.fastq");
        File::create(&plain).unwrap();
        assert_eq!(count_records(&plain).unwrap(), 0);

        let gz = dir.path().join("empty.fastq.gz");
        FastqWriter::create(&gz).unwrap().finish().unwrap();
        assert_eq!(count_records(&gz).unwrap(), 0);
    }

    #[test]
    fn test_read_stats_average_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reads.fastq");
        std::fs::write(&path, "@a desc\nACGT\n+\nIIII\n@b\nACGTACGT\n+\nIIIIIIII\n").unwrap();

        let stats = read_stats(&path).unwrap();
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.average_length(), Some(6.0));
    }

    #[test]
    fn test_missing_file_is_input_access_error() {
        let err = count_records(Path::new("/nonexistent/reads.fastq")).unwrap_err();
        assert!(matches!(err, RegionplexError::InputAccess { .. }));
    }
}
