//! Common test utilities for Regionplex tests
//!
//! In-process stand-ins for the external tools (aligner, merger, analyzer,
//! reference lookup) plus fixture writers, so whole runs can be driven
//! without any binary installed.
#![allow(dead_code)]

use parking_lot::Mutex;
use regionplex::bio::alignment::{GenomicSpan, SamRecord};
use regionplex::bio::fasta::parse_fasta;
use regionplex::bio::fastq::{for_each_record, FastqWriter};
use regionplex::bio::sequence::{reverse_complement, Sequence};
use regionplex::tools::{
    Aligner, AnalysisRequest, MergeOutputs, Merger, ReadSource, ReferenceSequences,
    RegionAnalyzer,
};
use regionplex::{RegionplexError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Aligner that places a read wherever it (or its reverse complement)
/// occurs verbatim in a reference. Reads can also be given a scripted SAM
/// line to exercise specific alignment geometry.
pub struct ExactMatchAligner {
    indexes: Mutex<HashMap<PathBuf, Vec<Sequence>>>,
    scripted: HashMap<String, String>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ExactMatchAligner {
    pub fn new() -> Self {
        Self {
            indexes: Mutex::new(HashMap::new()),
            scripted: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a prebuilt index, as a genome index would be.
    pub fn with_index(self, index: &Path, sequences: Vec<Sequence>) -> Self {
        self.indexes
            .lock()
            .insert(index.to_path_buf(), sequences);
        self
    }

    /// Report `sam_line` for the read named `qname` instead of searching.
    pub fn with_scripted(mut self, qname: &str, sam_line: &str) -> Self {
        self.scripted.insert(qname.to_string(), sam_line.to_string());
        self
    }

    fn place(&self, references: &[Sequence], name: &str, seq: &str, qual: &str) -> String {
        if let Some(line) = self.scripted.get(name) {
            return line.clone();
        }

        let rc = reverse_complement(seq);
        let mut hits: Vec<(String, usize, bool)> = Vec::new();
        for reference in references {
            let text = reference.to_string();
            if let Some(offset) = text.find(seq) {
                hits.push((reference.id.clone(), offset, false));
            } else if let Some(offset) = text.find(&rc) {
                hits.push((reference.id.clone(), offset, true));
            }
        }

        match hits.first() {
            Some((rname, offset, reverse)) => {
                let (flag, bases, quals) = if *reverse {
                    (16, rc.clone(), qual.chars().rev().collect::<String>())
                } else {
                    (0, seq.to_string(), qual.to_string())
                };
                format!(
                    "{}\t{}\t{}\t{}\t42\t{}M\t*\t0\t0\t{}\t{}\tAS:i:0",
                    name,
                    flag,
                    rname,
                    offset + 1,
                    seq.len(),
                    bases,
                    quals
                )
            }
            None => format!("{}\t4\t*\t0\t0\t*\t*\t0\t0\t{}\t{}", name, seq, qual),
        }
    }
}

impl Aligner for ExactMatchAligner {
    fn name(&self) -> &str {
        "exact-match"
    }

    fn build_index(&self, reference_fasta: &Path, index_prefix: &Path) -> Result<()> {
        self.calls
            .lock()
            .push(format!("build_index {}", index_prefix.display()));
        let sequences = parse_fasta(reference_fasta)?;
        self.indexes
            .lock()
            .insert(index_prefix.to_path_buf(), sequences);
        Ok(())
    }

    fn align(
        &self,
        index: &Path,
        reads: &ReadSource<'_>,
        on_record: &mut dyn FnMut(SamRecord) -> Result<()>,
    ) -> Result<()> {
        self.calls
            .lock()
            .push(format!("align {}", index.display()));
        let references = self
            .indexes
            .lock()
            .get(index)
            .cloned()
            .ok_or_else(|| RegionplexError::external("exact-match", "unknown index"))?;

        for_each_record(reads.path, |record| {
            let name = String::from_utf8_lossy(record.name()).to_string();
            let seq = String::from_utf8_lossy(record.seq).to_string();
            let qual = match record.qual {
                Some(q) => String::from_utf8_lossy(q).to_string(),
                None => "I".repeat(seq.len()),
            };
            let line = self.place(&references, &name, &seq, &qual);
            match SamRecord::parse_line(&line)? {
                Some(sam) => on_record(sam),
                None => Ok(()),
            }
        })?;
        Ok(())
    }
}

/// Merger joining mates whose ends overlap exactly by at least `min_overlap`.
pub struct OverlapMerger {
    pub min_overlap: usize,
}

fn read_all(path: &Path) -> Result<Vec<(String, String, String)>> {
    let mut reads = Vec::new();
    for_each_record(path, |record| {
        reads.push((
            String::from_utf8_lossy(record.name()).to_string(),
            String::from_utf8_lossy(record.seq).to_string(),
            String::from_utf8_lossy(record.qual.unwrap_or(b"")).to_string(),
        ));
        Ok(())
    })?;
    Ok(reads)
}

impl Merger for OverlapMerger {
    fn name(&self) -> &str {
        "overlap"
    }

    fn merge(&self, r1: &Path, r2: &Path, out_dir: &Path) -> Result<MergeOutputs> {
        let outputs = MergeOutputs {
            merged: out_dir.join("out.extendedFrags.fastq.gz"),
            unmerged_r1: out_dir.join("out.notCombined_1.fastq.gz"),
            unmerged_r2: out_dir.join("out.notCombined_2.fastq.gz"),
            histogram: None,
        };
        let mut merged = FastqWriter::create(&outputs.merged)?;
        let mut left = FastqWriter::create(&outputs.unmerged_r1)?;
        let mut right = FastqWriter::create(&outputs.unmerged_r2)?;

        for ((name, s1, q1), (_, s2, q2)) in read_all(r1)?.into_iter().zip(read_all(r2)?) {
            let mate = reverse_complement(&s2);
            let mate_qual: String = q2.chars().rev().collect();
            let longest = s1.len().min(mate.len());
            let overlap = (self.min_overlap..=longest)
                .rev()
                .find(|k| s1[s1.len() - k..] == mate[..*k]);

            match overlap {
                Some(k) => merged.write_record(
                    name.as_bytes(),
                    format!("{}{}", s1, &mate[k..]).as_bytes(),
                    format!("{}{}", q1, &mate_qual[k..]).as_bytes(),
                )?,
                None => {
                    left.write_record(name.as_bytes(), s1.as_bytes(), q1.as_bytes())?;
                    right.write_record(name.as_bytes(), s2.as_bytes(), q2.as_bytes())?;
                }
            }
        }

        merged.finish()?;
        left.finish()?;
        right.finish()?;
        Ok(outputs)
    }
}

/// Analyzer that records every request and optionally fails one region.
pub struct RecordingAnalyzer {
    pub requests: Arc<Mutex<Vec<AnalysisRequest>>>,
    fail_on: Option<String>,
}

impl RecordingAnalyzer {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_on: None,
        }
    }

    pub fn failing_on(region: &str) -> Self {
        Self {
            fail_on: Some(region.to_string()),
            ..Self::new()
        }
    }
}

impl RegionAnalyzer for RecordingAnalyzer {
    fn name(&self) -> &str {
        "recording"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<()> {
        self.requests.lock().push(request.clone());
        if self.fail_on.as_deref() == Some(request.region.as_str()) {
            return Err(RegionplexError::RegionAnalysis {
                region: request.region.clone(),
                message: "exited with status 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Reference lookup over chromosomes held in memory.
pub struct InMemoryReference {
    chromosomes: HashMap<String, String>,
}

impl InMemoryReference {
    pub fn new(sequences: &[Sequence]) -> Self {
        Self {
            chromosomes: sequences
                .iter()
                .map(|s| (s.id.clone(), s.to_string()))
                .collect(),
        }
    }
}

impl ReferenceSequences for InMemoryReference {
    fn fetch(&self, span: &GenomicSpan) -> Result<String> {
        let chrom = self
            .chromosomes
            .get(&span.reference)
            .ok_or_else(|| RegionplexError::external("reference", "unknown chromosome"))?;
        let start = (span.start.max(1) - 1) as usize;
        let end = (span.end - 1).clamp(0, chrom.len() as i64) as usize;
        Ok(chrom[start.min(end)..end].to_string())
    }
}

/// Deterministic pseudo-random nucleotide sequence.
pub fn random_sequence(seed: u64, len: usize) -> String {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            b"ACGT"[(state >> 33) as usize % 4] as char
        })
        .collect()
}

pub fn sequence(id: &str, bases: &str) -> Sequence {
    Sequence::new(id.to_string(), bases.as_bytes().to_vec())
}

/// Write reads as FASTQ with constant quality.
pub fn write_fastq(path: &Path, reads: &[(String, String)]) {
    let mut text = String::new();
    for (name, seq) in reads {
        text.push_str(&format!("@{}\n{}\n+\n{}\n", name, seq, "I".repeat(seq.len())));
    }
    std::fs::write(path, text).unwrap();
}

/// Write an amplicon description file from `(name, sequence, guide)` rows.
pub fn write_amplicons(path: &Path, rows: &[(&str, &str, Option<&str>)]) {
    let mut text = String::from("# name\tsequence\tguide\n");
    for (name, seq, guide) in rows {
        match guide {
            Some(guide) => text.push_str(&format!("{}\t{}\t{}\n", name, seq, guide)),
            None => text.push_str(&format!("{}\t{}\n", name, seq)),
        }
    }
    std::fs::write(path, text).unwrap();
}

/// Create the file the index check looks for under `basename`.
pub fn touch_index(basename: &Path) {
    std::fs::write(format!("{}.1.bt2", basename.display()), b"").unwrap();
}
