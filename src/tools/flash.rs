use super::runner::{run_logged, CommandLog};
use super::traits::{MergeOutputs, Merger};
use super::{Tool, Toolchain};
use crate::core::config::MergeConfig;
use crate::{RegionplexError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Output prefix FLASH uses inside its output directory.
const OUTPUT_PREFIX: &str = "out";

/// Paired-end merging with FLASH.
pub struct Flash {
    binary: PathBuf,
    config: MergeConfig,
    log: Arc<CommandLog>,
}

impl Flash {
    pub fn new(toolchain: &Toolchain, config: MergeConfig, log: Arc<CommandLog>) -> Result<Self> {
        Ok(Self {
            binary: toolchain.path(Tool::Flash)?.to_path_buf(),
            config,
            log,
        })
    }

    pub fn outputs(out_dir: &Path) -> MergeOutputs {
        MergeOutputs {
            merged: out_dir.join(format!("{}.extendedFrags.fastq.gz", OUTPUT_PREFIX)),
            unmerged_r1: out_dir.join(format!("{}.notCombined_1.fastq.gz", OUTPUT_PREFIX)),
            unmerged_r2: out_dir.join(format!("{}.notCombined_2.fastq.gz", OUTPUT_PREFIX)),
            histogram: Some(out_dir.join(format!("{}.hist", OUTPUT_PREFIX))),
        }
    }
}

impl Merger for Flash {
    fn name(&self) -> &str {
        "flash"
    }

    fn merge(&self, r1: &Path, r2: &Path, out_dir: &Path) -> Result<MergeOutputs> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(r1)
            .arg(r2)
            .arg("--min-overlap")
            .arg(self.config.min_overlap.to_string())
            .arg("--max-overlap")
            .arg(self.config.max_overlap.to_string())
            .arg("-z")
            .arg("-d")
            .arg(out_dir)
            .arg("-o")
            .arg(OUTPUT_PREFIX);

        run_logged(self.name(), &mut cmd, &self.log)
            .map_err(|e| RegionplexError::Merge(e.to_string()))?;

        let outputs = Self::outputs(out_dir);
        if !outputs.merged.is_file() {
            return Err(RegionplexError::Merge(format!(
                "FLASH did not produce {}",
                outputs.merged.display()
            )));
        }
        Ok(outputs)
    }
}
