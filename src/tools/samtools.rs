//! Uncompressed genome reference extracted from an aligner index.
//!
//! The FASTA is produced once per index basename with `bowtie2-inspect`,
//! indexed with `samtools faidx`, and reused by later runs.

use super::bowtie2::inspect_to_fasta;
use super::runner::{run_logged, CommandLog};
use super::traits::ReferenceSequences;
use super::{Tool, Toolchain};
use crate::bio::alignment::GenomicSpan;
use crate::bio::fasta::parse_fasta_from_bytes;
use crate::core::paths::uncompressed_reference_path;
use crate::Result;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

pub struct GenomeReference {
    toolchain: Toolchain,
    samtools: PathBuf,
    index: PathBuf,
    fasta: PathBuf,
    log: Arc<CommandLog>,
}

impl GenomeReference {
    /// Reference for `index`, cached under `genome_dir`. Nothing is extracted
    /// until [`ReferenceSequences::prepare`] runs.
    pub fn new(
        toolchain: &Toolchain,
        index: &Path,
        genome_dir: &Path,
        log: Arc<CommandLog>,
    ) -> Result<Self> {
        Ok(Self {
            toolchain: toolchain.clone(),
            samtools: toolchain.path(Tool::Samtools)?.to_path_buf(),
            index: index.to_path_buf(),
            fasta: uncompressed_reference_path(genome_dir, index),
            log,
        })
    }

    pub fn fasta(&self) -> &Path {
        &self.fasta
    }
}

impl ReferenceSequences for GenomeReference {
    fn prepare(&self) -> Result<()> {
        let fai = PathBuf::from(format!("{}.fai", self.fasta.display()));

        if self.fasta.is_file() {
            tracing::info!(
                "The uncompressed reference for {} is already present, skipping generation",
                self.index.display()
            );
        } else {
            if let Some(dir) = self.fasta.parent() {
                std::fs::create_dir_all(dir)?;
            }
            tracing::info!(
                "Extracting uncompressed reference from {}, this can take a while",
                self.index.display()
            );
            inspect_to_fasta(&self.toolchain, &self.index, &self.fasta, &self.log)?;
        }

        if !fai.is_file() {
            tracing::info!("Indexing {} with samtools", self.fasta.display());
            let mut cmd = Command::new(&self.samtools);
            cmd.arg("faidx").arg(&self.fasta);
            run_logged(Tool::Samtools.binary_name(), &mut cmd, &self.log)?;
        }
        Ok(())
    }

    fn fetch(&self, span: &GenomicSpan) -> Result<String> {
        let mut cmd = Command::new(&self.samtools);
        cmd.arg("faidx").arg(&self.fasta).arg(span.faidx_region());
        self.log.command(&cmd);

        let output = cmd
            .output()
            .map_err(|e| crate::RegionplexError::external("samtools", e.to_string()))?;
        if !output.status.success() {
            return Err(crate::RegionplexError::external(
                "samtools",
                format!(
                    "faidx {} failed: {}",
                    span.faidx_region(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let sequences = parse_fasta_from_bytes(&output.stdout)?;
        Ok(sequences
            .iter()
            .map(|s| s.to_string().to_ascii_uppercase())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn toolchain() -> Toolchain {
        let mut paths = HashMap::new();
        paths.insert(Tool::Samtools, PathBuf::from("/nonexistent/samtools"));
        paths.insert(Tool::Bowtie2Inspect, PathBuf::from("/nonexistent/bowtie2-inspect"));
        Toolchain::with_paths(paths)
    }

    #[test]
    fn test_cached_reference_is_reused() {
        let dir = TempDir::new().unwrap();
        let index = Path::new("/idx/hg38");
        let reference =
            GenomeReference::new(&toolchain(), index, dir.path(), Arc::new(CommandLog::disabled()))
                .unwrap();
        std::fs::write(reference.fasta(), ">chr1\nACGT\n").unwrap();
        std::fs::write(format!("{}.fai", reference.fasta().display()), "chr1\t4\t6\t4\t5\n").unwrap();

        // neither tool exists, so any extraction attempt would fail
        reference.prepare().unwrap();
        assert_eq!(
            reference.fasta(),
            dir.path().join("UNCOMPRESSED_REFERENCE_FROM__idx_hg38.fa")
        );
    }

    #[test]
    fn test_missing_reference_runs_extraction() {
        let dir = TempDir::new().unwrap();
        let reference = GenomeReference::new(
            &toolchain(),
            Path::new("/idx/hg38"),
            dir.path(),
            Arc::new(CommandLog::disabled()),
        )
        .unwrap();
        assert!(reference.prepare().is_err());
    }
}
