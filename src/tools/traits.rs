/// Trait definitions for the external collaborators of a run
///
/// Every external program the pipeline drives sits behind one of these
/// traits, so stages can be exercised with in-process implementations.
use crate::bio::alignment::{GenomicSpan, SamRecord};
use crate::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFormat {
    Fastq,
    Fasta,
}

/// Reads handed to an aligner.
#[derive(Debug, Clone, Copy)]
pub struct ReadSource<'a> {
    pub path: &'a Path,
    pub format: ReadFormat,
}

impl<'a> ReadSource<'a> {
    pub fn fastq(path: &'a Path) -> Self {
        Self {
            path,
            format: ReadFormat::Fastq,
        }
    }

    pub fn fasta(path: &'a Path) -> Self {
        Self {
            path,
            format: ReadFormat::Fasta,
        }
    }
}

/// Short-read aligner producing SAM-style placements
pub trait Aligner: Send + Sync {
    fn name(&self) -> &str;

    /// Build an index over a FASTA of reference sequences
    fn build_index(&self, reference_fasta: &Path, index_prefix: &Path) -> Result<()>;

    /// Align reads and hand each reported record to `on_record`, in aligner order
    fn align(
        &self,
        index: &Path,
        reads: &ReadSource<'_>,
        on_record: &mut dyn FnMut(SamRecord) -> Result<()>,
    ) -> Result<()>;
}

/// Output files of a paired-end trim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedTrimOutputs {
    pub r1: PathBuf,
    pub r1_unpaired: PathBuf,
    pub r2: PathBuf,
    pub r2_unpaired: PathBuf,
}

impl PairedTrimOutputs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            r1: dir.join("output_forward_paired.fq.gz"),
            r1_unpaired: dir.join("output_forward_unpaired.fq.gz"),
            r2: dir.join("output_reverse_paired.fq.gz"),
            r2_unpaired: dir.join("output_reverse_unpaired.fq.gz"),
        }
    }
}

/// Adapter and quality trimmer
pub trait Trimmer: Send + Sync {
    fn name(&self) -> &str;

    fn trim_single(&self, input: &Path, output: &Path) -> Result<()>;

    fn trim_paired(&self, r1: &Path, r2: &Path, outputs: &PairedTrimOutputs) -> Result<()>;
}

/// Files written by a paired-read merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutputs {
    pub merged: PathBuf,
    pub unmerged_r1: PathBuf,
    pub unmerged_r2: PathBuf,
    pub histogram: Option<PathBuf>,
}

/// Paired-end read merger
pub trait Merger: Send + Sync {
    fn name(&self) -> &str;

    fn merge(&self, r1: &Path, r2: &Path, out_dir: &Path) -> Result<MergeOutputs>;
}

/// Parameters of one per-region analysis call.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub region: String,
    pub reads: PathBuf,
    pub amplicon_sequence: String,
    pub guide: Option<String>,
    pub expected_hdr: Option<String>,
    pub coding_sequence: Option<String>,
    pub output_dir: PathBuf,
    /// Where the tool's own console output is captured
    pub log_path: PathBuf,
}

/// Per-region editing quantification
pub trait RegionAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, request: &AnalysisRequest) -> Result<()>;
}

/// Random access to reference genome sequence
pub trait ReferenceSequences: Send + Sync {
    /// Make the reference ready for lookups; called once before the first fetch
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Uppercased sequence covering `span`
    fn fetch(&self, span: &GenomicSpan) -> Result<String>;
}
