//! Per-region analysis dispatch.
//!
//! Included regions are analyzed on a bounded worker pool. A failing region
//! is recorded and the rest continue.

use crate::tools::{AnalysisRequest, RegionAnalyzer};
use crate::{RegionplexError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RegionStatus {
    Analyzed,
    Failed(String),
    Skipped(String),
}

impl RegionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RegionStatus::Analyzed => "analyzed",
            RegionStatus::Failed(_) => "failed",
            RegionStatus::Skipped(_) => "skipped",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            RegionStatus::Analyzed => None,
            RegionStatus::Failed(reason) | RegionStatus::Skipped(reason) => Some(reason),
        }
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} ({})", self.label(), detail),
            None => write!(f, "{}", self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub region: String,
    pub status: RegionStatus,
}

pub struct Dispatcher<'a> {
    analyzer: &'a dyn RegionAnalyzer,
    workers: usize,
    show_progress: bool,
}

impl<'a> Dispatcher<'a> {
    /// `workers == 0` uses one worker per CPU.
    pub fn new(analyzer: &'a dyn RegionAnalyzer, workers: usize) -> Self {
        let workers = if workers == 0 { num_cpus::get() } else { workers };
        Self {
            analyzer,
            workers,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run every request and report outcomes in request order.
    pub fn dispatch(&self, requests: &[AnalysisRequest]) -> Result<Vec<DispatchOutcome>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.min(requests.len()))
            .thread_name(|i| format!("regionplex-analysis-{}", i))
            .build()
            .map_err(|e| {
                RegionplexError::Configuration(format!("Cannot start analysis workers: {}", e))
            })?;

        let progress = if self.show_progress {
            let pb = ProgressBar::new(requests.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("█▓▒░"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        tracing::info!(
            "Analyzing {} regions with {} ({} workers)",
            requests.len(),
            self.analyzer.name(),
            pool.current_num_threads()
        );

        let outcomes = pool.install(|| {
            requests
                .par_iter()
                .map(|request| {
                    let status = self.analyze_one(request);
                    progress.inc(1);
                    DispatchOutcome {
                        region: request.region.clone(),
                        status,
                    }
                })
                .collect::<Vec<_>>()
        });
        progress.finish_and_clear();

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o.status, RegionStatus::Failed(_)))
            .count();
        if failed > 0 {
            tracing::warn!("{} of {} region analyses failed", failed, outcomes.len());
        }
        Ok(outcomes)
    }

    fn analyze_one(&self, request: &AnalysisRequest) -> RegionStatus {
        tracing::debug!("Analyzing region {}", request.region);
        match self.analyzer.analyze(request) {
            Ok(()) => RegionStatus::Analyzed,
            Err(e) => {
                let message = match e {
                    RegionplexError::RegionAnalysis { message, .. } => message,
                    other => other.to_string(),
                };
                tracing::error!("Analysis of region {} failed: {}", request.region, message);
                RegionStatus::Failed(message)
            }
        }
    }
}
