//! Aggregate outputs of a run: the region report table and a JSON summary.

use crate::core::pipeline::{RegionKind, RegionOutcome, RunOutcome};
use crate::core::selector::Thresholds;
use crate::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub mod text;

/// One line of `REGION_REPORT.tsv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReportRow {
    pub region: String,
    pub kind: String,
    pub reads: u64,
    pub percentage: String,
    pub included: bool,
    pub status: String,
    pub reason: String,
    pub location: String,
    pub genes: String,
}

impl From<&RegionOutcome> for RegionReportRow {
    fn from(outcome: &RegionOutcome) -> Self {
        let kind = match outcome.kind {
            RegionKind::Amplicon => "amplicon",
            RegionKind::Discovered => "discovered",
        };
        Self {
            region: outcome.name.clone(),
            kind: kind.to_string(),
            reads: outcome.decision.reads,
            percentage: format!("{:.2}", outcome.decision.percentage),
            included: outcome.decision.included,
            status: outcome.status.label().to_string(),
            reason: outcome.status.detail().unwrap_or_default().to_string(),
            location: outcome
                .location
                .as_ref()
                .map(|span| format!("{}:{}-{}", span.reference, span.start, span.end))
                .unwrap_or_default(),
            genes: outcome.genes.clone().unwrap_or_default(),
        }
    }
}

pub fn region_rows(outcome: &RunOutcome) -> Vec<RegionReportRow> {
    outcome.regions.iter().map(RegionReportRow::from).collect()
}

/// Write the region table as tab-separated text with a header line.
pub fn write_region_report<W: Write>(writer: W, outcome: &RunOutcome) -> Result<()> {
    let mut table = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in region_rows(outcome) {
        table.serialize(row).map_err(|e| {
            crate::RegionplexError::Parse(format!("Cannot write region report: {}", e))
        })?;
    }
    table.flush()?;
    Ok(())
}

pub fn save_region_report(path: &Path, outcome: &RunOutcome) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_region_report(file, outcome)?;
    tracing::info!("Region report written to {}", path.display());
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub name: &'a str,
    pub generated_at: String,
    pub thresholds: Thresholds,
    pub regions_total: usize,
    pub regions_analyzed: usize,
    pub regions_failed: usize,
    pub regions_skipped: usize,
    #[serde(flatten)]
    pub outcome: &'a RunOutcome,
}

impl<'a> RunSummary<'a> {
    pub fn new(name: &'a str, thresholds: Thresholds, outcome: &'a RunOutcome) -> Self {
        Self {
            name,
            generated_at: chrono::Local::now().to_rfc3339(),
            thresholds,
            regions_total: outcome.regions.len(),
            regions_analyzed: outcome.count("analyzed"),
            regions_failed: outcome.count("failed"),
            regions_skipped: outcome.count("skipped"),
            outcome,
        }
    }
}

pub fn save_run_summary(path: &Path, summary: &RunSummary<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| crate::RegionplexError::Parse(format!("Cannot encode run summary: {}", e)))?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::bio::alignment::{GenomicSpan, Strand};
    use crate::core::dispatcher::RegionStatus;
    use crate::core::mode::OperatingMode;
    use crate::core::pipeline::{PipelineRun, RegionKind, RegionOutcome, RunOutcome, RunTotals};
    use crate::core::selector::{RegionSelector, Thresholds};
    use std::path::PathBuf;

    pub fn outcome() -> RunOutcome {
        let selector = RegionSelector::new(Thresholds::default(), 100);
        RunOutcome {
            run: PipelineRun {
                mode: OperatingMode::AmpliconsAndGenome,
                output_dir: PathBuf::from("Regionplex_on_sample"),
                totals: RunTotals {
                    processed_reads: 120,
                    aligned_reads: 100,
                    unassigned_reads: 20,
                    ..Default::default()
                },
            },
            regions: vec![
                RegionOutcome {
                    name: "site1".to_string(),
                    kind: RegionKind::Amplicon,
                    location: Some(GenomicSpan {
                        reference: "chr3".to_string(),
                        start: 1000,
                        end: 1200,
                        strand: Strand::Forward,
                    }),
                    reads_file: PathBuf::from("AMPL_site1.fastq.gz"),
                    decision: selector.decide("site1", 100),
                    status: RegionStatus::Analyzed,
                    genes: Some("TP53 (NM_000546)".to_string()),
                },
                RegionOutcome {
                    name: "site2".to_string(),
                    kind: RegionKind::Amplicon,
                    location: None,
                    reads_file: PathBuf::from("AMPL_site2.fastq.gz"),
                    decision: selector.decide("site2", 0),
                    status: RegionStatus::Skipped("fewer than 50 reads".to_string()),
                    genes: None,
                },
            ],
        }
    }
}
