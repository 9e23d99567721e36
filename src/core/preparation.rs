//! Read preparation: raw single or paired FASTQ input becomes one processed
//! read stream, optionally trimmed and (for pairs) merged into consensus reads.

use crate::bio::fastq::{count_records, read_stats};
use crate::core::paths::force_symlink;
use crate::tools::{Merger, PairedTrimOutputs, Trimmer};
use crate::{RegionplexError, Result};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const TRIMMED_SINGLE_END: &str = "reads.trimmed.fq.gz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadInput {
    Single(PathBuf),
    Paired { r1: PathBuf, r2: PathBuf },
}

impl ReadInput {
    pub fn new(r1: PathBuf, r2: Option<PathBuf>) -> Self {
        match r2 {
            Some(r2) => ReadInput::Paired { r1, r2 },
            None => ReadInput::Single(r1),
        }
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, ReadInput::Paired { .. })
    }

    pub fn files(&self) -> Vec<&Path> {
        match self {
            ReadInput::Single(r1) => vec![r1.as_path()],
            ReadInput::Paired { r1, r2 } => vec![r1.as_path(), r2.as_path()],
        }
    }

    /// Every input file must be openable before any work starts.
    pub fn check_access(&self) -> Result<()> {
        for path in self.files() {
            File::open(path).map_err(|e| RegionplexError::input_access(path, e))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreparationStats {
    /// Reads (single-end) or read pairs (paired-end) in the input
    pub input_reads: u64,
    pub processed_reads: u64,
    pub unmerged_pairs: u64,
    pub average_processed_length: Option<f64>,
    pub trimmed: bool,
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedReads {
    pub processed: PathBuf,
    /// Pairs the merger could not join, kept aside and not aligned
    pub unmerged: Option<(PathBuf, PathBuf)>,
    pub histogram: Option<PathBuf>,
    pub stats: PreparationStats,
}

/// Failures of the trimmer surface as preprocessing failures.
fn trim_failure(e: RegionplexError) -> RegionplexError {
    match e {
        RegionplexError::Preprocessing(_) | RegionplexError::Configuration(_) => e,
        other => RegionplexError::Preprocessing(other.to_string()),
    }
}

fn merge_failure(e: RegionplexError) -> RegionplexError {
    match e {
        RegionplexError::Merge(_) | RegionplexError::Configuration(_) => e,
        other => RegionplexError::Merge(other.to_string()),
    }
}

pub struct ReadPreparation<'a> {
    out_dir: &'a Path,
    trimmer: Option<&'a dyn Trimmer>,
    merger: Option<&'a dyn Merger>,
}

impl<'a> ReadPreparation<'a> {
    pub fn new(out_dir: &'a Path) -> Self {
        Self {
            out_dir,
            trimmer: None,
            merger: None,
        }
    }

    pub fn with_trimmer(mut self, trimmer: &'a dyn Trimmer) -> Self {
        self.trimmer = Some(trimmer);
        self
    }

    pub fn with_merger(mut self, merger: &'a dyn Merger) -> Self {
        self.merger = Some(merger);
        self
    }

    pub fn prepare(&self, input: &ReadInput) -> Result<PreparedReads> {
        let mut prepared = match input {
            ReadInput::Single(r1) => self.prepare_single(r1)?,
            ReadInput::Paired { r1, r2 } => self.prepare_paired(r1, r2)?,
        };

        let input_path = input.files()[0];
        prepared.stats.input_reads = count_records(input_path)?;
        let processed = read_stats(&prepared.processed)?;
        prepared.stats.processed_reads = processed.reads;
        prepared.stats.average_processed_length = processed.average_length();
        if let Some((unmerged_r1, _)) = &prepared.unmerged {
            if unmerged_r1.is_file() {
                prepared.stats.unmerged_pairs = count_records(unmerged_r1)?;
            }
        }

        tracing::info!(
            "Prepared {} reads from {} input {}",
            prepared.stats.processed_reads,
            prepared.stats.input_reads,
            if input.is_paired() { "pairs" } else { "reads" }
        );
        Ok(prepared)
    }

    fn prepare_single(&self, r1: &Path) -> Result<PreparedReads> {
        let (processed, trimmed) = match self.trimmer {
            Some(trimmer) => {
                tracing::info!("Trimming reads with {}", trimmer.name());
                let output = self.out_dir.join(TRIMMED_SINGLE_END);
                trimmer.trim_single(r1, &output).map_err(trim_failure)?;
                (output, true)
            }
            None => {
                let file_name = r1.file_name().ok_or_else(|| {
                    RegionplexError::Configuration(format!("{} is not a file", r1.display()))
                })?;
                let link = self.out_dir.join(file_name);
                force_symlink(r1, &link)?;
                (link, false)
            }
        };

        Ok(PreparedReads {
            processed,
            unmerged: None,
            histogram: None,
            stats: PreparationStats {
                trimmed,
                ..Default::default()
            },
        })
    }

    fn prepare_paired(&self, r1: &Path, r2: &Path) -> Result<PreparedReads> {
        let merger = self.merger.ok_or_else(|| {
            RegionplexError::Configuration("paired-end input needs a read merger".to_string())
        })?;

        let (r1, r2, trimmed) = match self.trimmer {
            Some(trimmer) => {
                tracing::info!("Trimming read pairs with {}", trimmer.name());
                let outputs = PairedTrimOutputs::in_dir(self.out_dir);
                trimmer
                    .trim_paired(r1, r2, &outputs)
                    .map_err(trim_failure)?;
                (outputs.r1, outputs.r2, true)
            }
            None => (r1.to_path_buf(), r2.to_path_buf(), false),
        };

        tracing::info!("Merging paired reads with {}", merger.name());
        let outputs = merger.merge(&r1, &r2, self.out_dir).map_err(merge_failure)?;

        Ok(PreparedReads {
            processed: outputs.merged,
            unmerged: Some((outputs.unmerged_r1, outputs.unmerged_r2)),
            histogram: outputs.histogram,
            stats: PreparationStats {
                trimmed,
                merged: true,
                ..Default::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MergeOutputs;
    use tempfile::TempDir;

    struct FailingMerger;

    impl Merger for FailingMerger {
        fn name(&self) -> &str {
            "failing"
        }

        fn merge(&self, _r1: &Path, _r2: &Path, _out_dir: &Path) -> Result<MergeOutputs> {
            Err(RegionplexError::external("flash", "exited with status 1"))
        }
    }

    struct FailingTrimmer;

    impl Trimmer for FailingTrimmer {
        fn name(&self) -> &str {
            "failing"
        }

        fn trim_single(&self, _input: &Path, _output: &Path) -> Result<()> {
            Err(RegionplexError::external("trimmomatic", "exited with status 1"))
        }

        fn trim_paired(&self, _r1: &Path, _r2: &Path, _o: &PairedTrimOutputs) -> Result<()> {
            Err(RegionplexError::external("trimmomatic", "exited with status 1"))
        }
    }

    fn write_reads(path: &Path, n: usize) {
        let mut text = String::new();
        for i in 0..n {
            text.push_str(&format!("@r{}\nACGTACGT\n+\nIIIIIIII\n", i));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_single_end_without_trimming_links_source() {
        let dir = TempDir::new().unwrap();
        let reads = dir.path().join("sample.fastq");
        write_reads(&reads, 3);
        let out = dir.path().join("run");
        std::fs::create_dir(&out).unwrap();

        let prepared = ReadPreparation::new(&out)
            .prepare(&ReadInput::Single(reads))
            .unwrap();
        assert_eq!(prepared.processed, out.join("sample.fastq"));
        assert_eq!(prepared.stats.input_reads, 3);
        assert_eq!(prepared.stats.processed_reads, 3);
        assert_eq!(prepared.stats.average_processed_length, Some(8.0));
        assert!(!prepared.stats.trimmed);
    }

    #[test]
    fn test_trim_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let reads = dir.path().join("sample.fastq");
        write_reads(&reads, 1);

        let err = ReadPreparation::new(dir.path())
            .with_trimmer(&FailingTrimmer)
            .prepare(&ReadInput::Single(reads))
            .unwrap_err();
        assert!(matches!(err, RegionplexError::Preprocessing(_)));
    }

    #[test]
    fn test_merge_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let r1 = dir.path().join("r1.fastq");
        let r2 = dir.path().join("r2.fastq");
        write_reads(&r1, 1);
        write_reads(&r2, 1);

        let err = ReadPreparation::new(dir.path())
            .with_merger(&FailingMerger)
            .prepare(&ReadInput::new(r1, Some(r2)))
            .unwrap_err();
        assert!(matches!(err, RegionplexError::Merge(_)));
    }

    #[test]
    fn test_paired_input_requires_merger() {
        let dir = TempDir::new().unwrap();
        let input = ReadInput::new(dir.path().join("a.fq"), Some(dir.path().join("b.fq")));
        let err = ReadPreparation::new(dir.path()).prepare(&input).unwrap_err();
        assert!(matches!(err, RegionplexError::Configuration(_)));
    }

    #[test]
    fn test_check_access_names_missing_file() {
        let input = ReadInput::Single(PathBuf::from("/nonexistent/reads.fastq.gz"));
        match input.check_access().unwrap_err() {
            RegionplexError::InputAccess { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/reads.fastq.gz"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
