//! Staged orchestration of one run.
//!
//! Read preparation, demultiplexing, selection and dispatch run strictly in
//! sequence. Everything fatal happens before the dispatcher; from there on a
//! failure only marks the region it belongs to.

use crate::bio::alignment::GenomicSpan;
use crate::bio::genes::GeneAnnotations;
use crate::bio::region::RegionCatalog;
use crate::core::dispatcher::{Dispatcher, RegionStatus};
use crate::core::mode::OperatingMode;
use crate::core::paths::RunLayout;
use crate::core::preparation::{PreparationStats, ReadInput, ReadPreparation};
use crate::core::selector::{RegionSelector, SelectionDecision, Thresholds};
use crate::demux::{
    place_amplicons, Demultiplexer, DemuxResult, ReadBucket, DEFAULT_MAX_OPEN_BUCKETS,
};
use crate::tools::bowtie2::find_index_file;
use crate::tools::{
    AnalysisRequest, Aligner, Merger, ReferenceSequences, RegionAnalyzer, Trimmer,
};
use crate::{RegionplexError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Files a run starts from.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub reads: ReadInput,
    pub amplicons: Option<PathBuf>,
    pub genome_index: Option<PathBuf>,
    pub gene_annotations: Option<PathBuf>,
}

impl RunInputs {
    pub fn mode(&self) -> Result<OperatingMode> {
        OperatingMode::from_inputs(self.amplicons.is_some(), self.genome_index.is_some())
    }

    /// Every input must be readable before the run starts.
    pub fn check_access(&self) -> Result<()> {
        self.reads.check_access()?;
        for path in self.amplicons.iter().chain(self.gene_annotations.iter()) {
            File::open(path).map_err(|e| RegionplexError::input_access(path, e))?;
        }
        if let Some(index) = &self.genome_index {
            if find_index_file(index).is_none() {
                return Err(RegionplexError::input_access(
                    index,
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        "no .1.bt2 or .1.bt2l index file for this basename",
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// The external collaborators of a run.
pub struct Toolkit {
    pub aligner: Box<dyn Aligner>,
    pub trimmer: Option<Box<dyn Trimmer>>,
    pub merger: Option<Box<dyn Merger>>,
    pub analyzer: Box<dyn RegionAnalyzer>,
    /// Needed whenever a genome index is part of the run
    pub reference: Option<Box<dyn ReferenceSequences>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub thresholds: Thresholds,
    /// Concurrent region analyses, 0 for one per CPU
    pub workers: usize,
    pub max_open_buckets: usize,
    pub show_progress: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            workers: 0,
            max_open_buckets: DEFAULT_MAX_OPEN_BUCKETS,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunTotals {
    pub preparation: PreparationStats,
    /// Reads that entered alignment
    pub processed_reads: u64,
    pub aligned_reads: u64,
    pub unassigned_reads: u64,
}

/// Process-wide state of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub mode: OperatingMode,
    pub output_dir: PathBuf,
    pub totals: RunTotals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Amplicon,
    Discovered,
}

/// Everything known about one region at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutcome {
    pub name: String,
    pub kind: RegionKind,
    pub location: Option<GenomicSpan>,
    pub reads_file: PathBuf,
    pub decision: SelectionDecision,
    pub status: RegionStatus,
    pub genes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run: PipelineRun,
    pub regions: Vec<RegionOutcome>,
}

impl RunOutcome {
    pub fn count(&self, label: &str) -> usize {
        self.regions
            .iter()
            .filter(|r| r.status.label() == label)
            .count()
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    pub fn execute(
        &self,
        inputs: &RunInputs,
        layout: &RunLayout,
        toolkit: &Toolkit,
    ) -> Result<RunOutcome> {
        let mode = inputs.mode()?;
        inputs.check_access()?;
        tracing::info!("Operating mode: {}", mode.description());

        let catalog = match &inputs.amplicons {
            Some(path) => {
                let catalog = RegionCatalog::from_path(path)?;
                tracing::info!("Loaded {} amplicons from {}", catalog.len(), path.display());
                Some(catalog)
            }
            None => None,
        };
        let genes = match &inputs.gene_annotations {
            Some(path) => Some(GeneAnnotations::load(path)?),
            None => None,
        };

        layout.create()?;

        let reference = if mode.uses_genome() {
            let reference = toolkit.reference.as_deref().ok_or_else(|| {
                RegionplexError::Configuration(
                    "a genome index needs a reference sequence source".to_string(),
                )
            })?;
            reference.prepare()?;
            Some(reference)
        } else {
            None
        };

        let mut preparation = ReadPreparation::new(layout.root());
        if let Some(trimmer) = toolkit.trimmer.as_deref() {
            preparation = preparation.with_trimmer(trimmer);
        }
        if let Some(merger) = toolkit.merger.as_deref() {
            preparation = preparation.with_merger(merger);
        }
        let prepared = preparation.prepare(&inputs.reads)?;

        let demux = Demultiplexer::new(toolkit.aligner.as_ref(), layout)
            .with_max_open_buckets(self.settings.max_open_buckets)
            .run(
                mode,
                catalog.as_ref(),
                inputs.genome_index.as_deref(),
                &prepared.processed,
            )?;

        let placements = match (&catalog, &inputs.genome_index) {
            (Some(catalog), Some(index)) => {
                tracing::info!("Placing amplicons on the genome");
                place_amplicons(
                    toolkit.aligner.as_ref(),
                    index,
                    &layout.amplicons_fasta(),
                    catalog,
                )?
            }
            _ => HashMap::new(),
        };

        let run = PipelineRun {
            mode,
            output_dir: layout.root().to_path_buf(),
            totals: RunTotals {
                preparation: prepared.stats.clone(),
                processed_reads: demux.total_reads,
                aligned_reads: demux.aligned_reads(),
                unassigned_reads: demux.unassigned.reads,
            },
        };

        let selector = RegionSelector::new(self.settings.thresholds, demux.aligned_reads());
        let mut regions = self.collect_regions(catalog.as_ref(), &demux, &placements, &selector);

        if let Some(genes) = &genes {
            for outcome in &mut regions {
                if let Some(span) = &outcome.location {
                    outcome.genes = Some(genes.describe(span));
                }
            }
        }

        let requests = self.analysis_requests(layout, catalog.as_ref(), reference, &mut regions);
        let outcomes = Dispatcher::new(toolkit.analyzer.as_ref(), self.settings.workers)
            .with_progress(self.settings.show_progress)
            .dispatch(&requests)?;

        let mut by_name: HashMap<String, RegionStatus> = outcomes
            .into_iter()
            .map(|o| (o.region, o.status))
            .collect();
        for outcome in &mut regions {
            if let Some(status) = by_name.remove(&outcome.name) {
                outcome.status = status;
            }
        }

        Ok(RunOutcome { run, regions })
    }

    /// Selection decisions for catalog regions, in catalog order, then
    /// discovered regions by coordinate. Excluded regions start as skipped.
    fn collect_regions(
        &self,
        catalog: Option<&RegionCatalog>,
        demux: &DemuxResult,
        placements: &HashMap<String, GenomicSpan>,
        selector: &RegionSelector,
    ) -> Vec<RegionOutcome> {
        let mut found: Vec<(String, RegionKind, Option<GenomicSpan>, &ReadBucket)> = Vec::new();
        if let Some(catalog) = catalog {
            for (region, bucket) in catalog.iter().zip(&demux.amplicons) {
                found.push((
                    region.name.clone(),
                    RegionKind::Amplicon,
                    placements.get(&region.name).cloned(),
                    bucket,
                ));
            }
        }
        for discovered in &demux.discovered {
            found.push((
                discovered.region.name(),
                RegionKind::Discovered,
                Some(discovered.region.span()),
                &discovered.bucket,
            ));
        }

        let decisions = selector.select(
            found
                .iter()
                .map(|(name, _, _, bucket)| (name.as_str(), bucket.reads)),
        );

        found
            .into_iter()
            .zip(decisions)
            .map(|((name, kind, location, bucket), decision)| RegionOutcome {
                status: match &decision.exclusion {
                    Some(reason) => RegionStatus::Skipped(reason.to_string()),
                    None => RegionStatus::Analyzed,
                },
                name,
                kind,
                location,
                reads_file: bucket.path.clone(),
                decision,
                genes: None,
            })
            .collect()
    }

    /// One request per included region. A discovered region whose sequence
    /// cannot be fetched is marked failed instead.
    fn analysis_requests(
        &self,
        layout: &RunLayout,
        catalog: Option<&RegionCatalog>,
        reference: Option<&dyn ReferenceSequences>,
        regions: &mut [RegionOutcome],
    ) -> Vec<AnalysisRequest> {
        let mut requests = Vec::new();

        for outcome in regions.iter_mut().filter(|r| r.decision.included) {
            let request = match outcome.kind {
                RegionKind::Amplicon => catalog
                    .and_then(|c| c.get(&outcome.name))
                    .map(|region| AnalysisRequest {
                        region: region.name.clone(),
                        reads: outcome.reads_file.clone(),
                        amplicon_sequence: region.sequence.clone(),
                        guide: region.guide.clone(),
                        expected_hdr: region.expected_hdr.clone(),
                        coding_sequence: region.coding_sequence.clone(),
                        output_dir: layout.root().to_path_buf(),
                        log_path: layout.analysis_log(&region.file_stem()),
                    })
                    .ok_or_else(|| format!("{} is not in the catalog", outcome.name)),
                RegionKind::Discovered => {
                    discovered_request(layout, reference, outcome).map_err(|e| e.to_string())
                }
            };

            match request {
                Ok(request) => requests.push(request),
                Err(message) => {
                    tracing::error!("Cannot analyze region {}: {}", outcome.name, message);
                    outcome.status = RegionStatus::Failed(message);
                }
            }
        }
        requests
    }
}

fn discovered_request(
    layout: &RunLayout,
    reference: Option<&dyn ReferenceSequences>,
    outcome: &RegionOutcome,
) -> Result<AnalysisRequest> {
    let span = outcome
        .location
        .as_ref()
        .ok_or_else(|| RegionplexError::Parse(format!("{} has no location", outcome.name)))?;
    let reference = reference.ok_or_else(|| {
        RegionplexError::Configuration("no reference sequence source".to_string())
    })?;
    let sequence = reference.fetch(span)?;
    let stem = stem_of(&outcome.reads_file);

    Ok(AnalysisRequest {
        region: outcome.name.clone(),
        reads: outcome.reads_file.clone(),
        amplicon_sequence: sequence,
        guide: None,
        expected_hdr: None,
        coding_sequence: None,
        output_dir: layout.root().to_path_buf(),
        log_path: layout.analysis_log(&stem),
    })
}

/// `REGION_chr1_1_2.fastq.gz` -> `REGION_chr1_1_2`
fn stem_of(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.strip_suffix(".fastq.gz").unwrap_or(&name).to_string()
}
