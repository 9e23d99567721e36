//! Bowtie2 aligner, index builder and index inspector.

use super::runner::{run_logged, stream_stdout, CommandLog};
use super::traits::{Aligner, ReadFormat, ReadSource};
use super::{Tool, Toolchain};
use crate::bio::alignment::SamRecord;
use crate::core::config::AlignmentConfig;
use crate::{RegionplexError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Index files checked to decide whether an index basename is usable.
pub const INDEX_FILE_SUFFIXES: [&str; 2] = [".1.bt2", ".1.bt2l"];

/// First existing index file for a basename, if any.
pub fn find_index_file(index: &Path) -> Option<PathBuf> {
    INDEX_FILE_SUFFIXES
        .iter()
        .map(|suffix| PathBuf::from(format!("{}{}", index.display(), suffix)))
        .find(|p| p.is_file())
}

/// Alignment flags derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentPolicy {
    pub max_placements: u32,
    pub end_to_end: bool,
    pub seed_mismatches: u8,
    pub n_penalty: u32,
    pub threads: usize,
    pub extra_args: Vec<String>,
}

impl AlignmentPolicy {
    pub fn from_config(config: &AlignmentConfig, run_threads: usize) -> Self {
        Self {
            max_placements: config.max_placements,
            end_to_end: config.end_to_end,
            seed_mismatches: config.seed_mismatches,
            n_penalty: config.n_penalty,
            threads: if config.threads == 0 {
                run_threads.max(1)
            } else {
                config.threads
            },
            extra_args: config.extra_args.clone(),
        }
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.threads.to_string(),
            "-k".to_string(),
            self.max_placements.to_string(),
        ];
        args.push(if self.end_to_end { "--end-to-end" } else { "--local" }.to_string());
        args.extend([
            "-N".to_string(),
            self.seed_mismatches.to_string(),
            "--np".to_string(),
            self.n_penalty.to_string(),
        ]);
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

pub struct Bowtie2 {
    aligner: PathBuf,
    builder: Option<PathBuf>,
    policy: AlignmentPolicy,
    log: Arc<CommandLog>,
}

impl Bowtie2 {
    pub fn new(toolchain: &Toolchain, policy: AlignmentPolicy, log: Arc<CommandLog>) -> Result<Self> {
        Ok(Self {
            aligner: toolchain.path(Tool::Bowtie2)?.to_path_buf(),
            builder: toolchain.path(Tool::Bowtie2Build).ok().map(Path::to_path_buf),
            policy,
            log,
        })
    }
}

impl Aligner for Bowtie2 {
    fn name(&self) -> &str {
        "bowtie2"
    }

    fn build_index(&self, reference_fasta: &Path, index_prefix: &Path) -> Result<()> {
        let builder = self.builder.as_ref().ok_or_else(|| RegionplexError::MissingDependency {
            tool: Tool::Bowtie2Build.binary_name().to_string(),
            hint: Tool::Bowtie2Build.install_hint().to_string(),
        })?;
        let mut cmd = Command::new(builder);
        cmd.arg(reference_fasta).arg(index_prefix);
        run_logged(Tool::Bowtie2Build.binary_name(), &mut cmd, &self.log)?;
        Ok(())
    }

    fn align(
        &self,
        index: &Path,
        reads: &ReadSource<'_>,
        on_record: &mut dyn FnMut(SamRecord) -> Result<()>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.aligner);
        cmd.arg("-x").arg(index).args(self.policy.args());
        if reads.format == ReadFormat::Fasta {
            cmd.arg("-f");
        }
        cmd.arg("-U").arg(reads.path);

        stream_stdout(self.name(), &mut cmd, &self.log, &mut |line| {
            match SamRecord::parse_line(line)? {
                Some(record) => on_record(record),
                None => Ok(()),
            }
        })
    }
}

/// Write the sequences stored in an index back out as FASTA.
pub fn inspect_to_fasta(
    toolchain: &Toolchain,
    index: &Path,
    output: &Path,
    log: &CommandLog,
) -> Result<()> {
    let mut cmd = Command::new(toolchain.path(Tool::Bowtie2Inspect)?);
    cmd.arg("-o").arg(output).arg(index);
    run_logged(Tool::Bowtie2Inspect.binary_name(), &mut cmd, log)?;
    Ok(())
}
