use super::runner::{run_to_file, CommandLog};
use super::traits::{AnalysisRequest, RegionAnalyzer};
use super::{Tool, Toolchain};
use crate::core::config::AnalysisConfig;
use crate::{RegionplexError, Result};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

/// Per-region editing quantification with CRISPResso.
pub struct Crispresso {
    binary: PathBuf,
    options: AnalysisConfig,
    log: Arc<CommandLog>,
}

impl Crispresso {
    pub fn new(toolchain: &Toolchain, options: AnalysisConfig, log: Arc<CommandLog>) -> Result<Self> {
        Ok(Self {
            binary: toolchain.path(Tool::Crispresso)?.to_path_buf(),
            options,
            log,
        })
    }

    pub fn command(&self, request: &AnalysisRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-r1")
            .arg(&request.reads)
            .arg("-a")
            .arg(&request.amplicon_sequence)
            .arg("-o")
            .arg(&request.output_dir);

        let optional = [
            ("-g", &request.guide),
            ("-e", &request.expected_hdr),
            ("-c", &request.coding_sequence),
        ];
        for (flag, value) in optional {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                cmd.arg(flag).arg(value);
            }
        }

        let o = &self.options;
        cmd.arg("--min_average_read_quality")
            .arg(o.min_average_read_quality.to_string())
            .arg("--min_single_bp_quality")
            .arg(o.min_single_bp_quality.to_string())
            .arg("--min_identity_score")
            .arg(o.min_identity_score.to_string())
            .arg("-w")
            .arg(o.window_around_sgrna.to_string())
            .arg("--exclude_bp_from_left")
            .arg(o.exclude_bp_from_left.to_string())
            .arg("--exclude_bp_from_right")
            .arg(o.exclude_bp_from_right.to_string())
            .arg("--hdr_perfect_alignment_threshold")
            .arg(o.hdr_perfect_alignment_threshold.to_string())
            .arg("--needle_options_string")
            .arg(&o.needle_options);
        if o.keep_intermediate {
            cmd.arg("--keep_intermediate");
        }
        if o.save_also_png {
            cmd.arg("--save_also_png");
        }
        cmd
    }
}

impl RegionAnalyzer for Crispresso {
    fn name(&self) -> &str {
        "CRISPResso"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<()> {
        let mut cmd = self.command(request);
        run_to_file(self.name(), &mut cmd, &self.log, &request.log_path).map_err(|e| {
            RegionplexError::RegionAnalysis {
                region: request.region.clone(),
                message: e.to_string(),
            }
        })
    }
}
