use crate::cli::formatter::{notify, print_run_setup, print_stage, print_totals, Notice, Stage};
use crate::core::config::{default_config, load_config, Config};
use crate::core::paths::{genome_dir, run_name_from_reads, RunLayout};
use crate::core::pipeline::{Pipeline, PipelineSettings, RunInputs, Toolkit};
use crate::core::preparation::ReadInput;
use crate::core::selector::Thresholds;
use crate::demux::DEFAULT_MAX_OPEN_BUCKETS;
use crate::report::{save_region_report, save_run_summary, text, RunSummary};
use crate::tools::bowtie2::{AlignmentPolicy, Bowtie2};
use crate::tools::crispresso::Crispresso;
use crate::tools::flash::Flash;
use crate::tools::samtools::GenomeReference;
use crate::tools::trimmomatic::Trimmomatic;
use crate::tools::{required_tools, CommandLog, Merger, ReferenceSequences, Toolchain, Trimmer};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// First (or only) FASTQ file, optionally gzip-compressed
    #[arg(long = "fastq-r1", visible_alias = "r1", value_name = "FILE")]
    pub fastq_r1: PathBuf,

    /// Second FASTQ file for paired-end reads
    #[arg(long = "fastq-r2", visible_alias = "r2", value_name = "FILE")]
    pub fastq_r2: Option<PathBuf>,

    /// Tab-separated amplicon description file
    #[arg(short = 'f', long, value_name = "FILE")]
    pub amplicons_file: Option<PathBuf>,

    /// Basename of a Bowtie2 genome index
    #[arg(short = 'x', long, value_name = "INDEX")]
    pub bowtie2_index: Option<PathBuf>,

    /// Gzip-compressed UCSC gene table used to annotate region locations
    #[arg(long, value_name = "FILE")]
    pub gene_annotations: Option<PathBuf>,

    /// Run name (default: derived from the FASTQ file names)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Parent folder of the run's output directory
    #[arg(short, long, value_name = "DIR")]
    pub output_folder: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Minimum number of reads a region needs to be analyzed
    #[arg(long)]
    pub min_reads_to_use_region: Option<u64>,

    /// Minimum percentage of aligned reads a region needs to be analyzed
    #[arg(long)]
    pub min_perc_reads_to_use_region: Option<f64>,

    /// Minimum overlap when merging paired-end reads
    #[arg(long)]
    pub min_paired_end_reads_overlap: Option<u32>,

    /// Maximum overlap when merging paired-end reads
    #[arg(long)]
    pub max_paired_end_reads_overlap: Option<u32>,

    /// Trim adapters with Trimmomatic before anything else
    #[arg(long)]
    pub trim_sequences: bool,

    /// Trimmomatic jar file
    #[arg(long, value_name = "JAR")]
    pub trimmomatic_jar: Option<PathBuf>,

    /// Adapter file for single-end trimming
    #[arg(long, value_name = "FILE")]
    pub single_end_adapters: Option<PathBuf>,

    /// Adapter file for paired-end trimming
    #[arg(long, value_name = "FILE")]
    pub paired_end_adapters: Option<PathBuf>,

    /// Minimum average read quality (phred33) to keep a read
    #[arg(short = 'q', long)]
    pub min_average_read_quality: Option<u32>,

    /// Minimum single-bp quality (phred33) to keep a read
    #[arg(short = 's', long)]
    pub min_single_bp_quality: Option<u32>,

    /// Minimum identity score for an alignment to the amplicon
    #[arg(long)]
    pub min_identity_score: Option<f64>,

    /// Window in bp around each guide used to quantify indels (-1 disables it)
    #[arg(short = 'w', long, allow_hyphen_values = true)]
    pub window_around_sgrna: Option<i32>,

    /// Bases excluded from the left end of the amplicon
    #[arg(long)]
    pub exclude_bp_from_left: Option<u32>,

    /// Bases excluded from the right end of the amplicon
    #[arg(long)]
    pub exclude_bp_from_right: Option<u32>,

    /// Sequence homology percentage for an HDR occurrence
    #[arg(long)]
    pub hdr_perfect_alignment_threshold: Option<f64>,

    /// Options passed to needle
    #[arg(long, allow_hyphen_values = true)]
    pub needle_options: Option<String>,

    /// Keep the analysis tool's intermediate files
    #[arg(long)]
    pub keep_intermediate: bool,

    /// Save plots as PNG as well as PDF
    #[arg(long)]
    pub save_also_png: bool,

    /// Concurrent region analyses (default: the global thread count)
    #[arg(short = 'p', long)]
    pub n_processes: Option<usize>,

    /// Compressed read containers kept open at once while demultiplexing
    #[arg(long, default_value_t = DEFAULT_MAX_OPEN_BUCKETS)]
    pub max_open_buckets: usize,

    /// Hide the analysis progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Number of threads (passed from global)
    #[arg(skip)]
    pub threads: usize,
}

impl RunArgs {
    /// Layer explicit flags over the loaded configuration.
    fn apply_to(&self, config: &mut Config) {
        if let Some(v) = self.min_reads_to_use_region {
            config.thresholds.min_reads_to_use_region = v;
        }
        if let Some(v) = self.min_perc_reads_to_use_region {
            config.thresholds.min_perc_reads_to_use_region = v;
        }
        if let Some(v) = self.min_paired_end_reads_overlap {
            config.merge.min_overlap = v;
        }
        if let Some(v) = self.max_paired_end_reads_overlap {
            config.merge.max_overlap = v;
        }

        if self.trim_sequences {
            config.trimming.enabled = true;
        }
        if let Some(jar) = &self.trimmomatic_jar {
            config.trimming.jar = Some(jar.clone());
        }
        if let Some(adapters) = &self.single_end_adapters {
            config.trimming.single_end_adapters = Some(adapters.clone());
        }
        if let Some(adapters) = &self.paired_end_adapters {
            config.trimming.paired_end_adapters = Some(adapters.clone());
        }

        let analysis = &mut config.analysis;
        if let Some(v) = self.min_average_read_quality {
            analysis.min_average_read_quality = v;
        }
        if let Some(v) = self.min_single_bp_quality {
            analysis.min_single_bp_quality = v;
        }
        if let Some(v) = self.min_identity_score {
            analysis.min_identity_score = v;
        }
        if let Some(v) = self.window_around_sgrna {
            analysis.window_around_sgrna = v;
        }
        if let Some(v) = self.exclude_bp_from_left {
            analysis.exclude_bp_from_left = v;
        }
        if let Some(v) = self.exclude_bp_from_right {
            analysis.exclude_bp_from_right = v;
        }
        if let Some(v) = self.hdr_perfect_alignment_threshold {
            analysis.hdr_perfect_alignment_threshold = v;
        }
        if let Some(v) = &self.needle_options {
            analysis.needle_options = v.clone();
        }
        analysis.keep_intermediate |= self.keep_intermediate;
        analysis.save_also_png |= self.save_also_png;
    }

    fn inputs(&self) -> RunInputs {
        RunInputs {
            reads: ReadInput::new(self.fastq_r1.clone(), self.fastq_r2.clone()),
            amplicons: self.amplicons_file.clone(),
            genome_index: self.bowtie2_index.clone(),
            gene_annotations: self.gene_annotations.clone(),
        }
    }
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let threads = if args.threads == 0 {
        rayon::current_num_threads()
    } else {
        args.threads
    };

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    args.apply_to(&mut config);
    config.validate()?;

    let inputs = args.inputs();
    let mode = inputs.mode()?;
    let paired = inputs.reads.is_paired();

    print_stage(Stage::Dependencies);
    let required = required_tools(mode, paired, config.trimming.enabled);
    let toolchain = Toolchain::resolve(&config.tools, &required)?;
    inputs.check_access()?;

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| run_name_from_reads(&args.fastq_r1, args.fastq_r2.as_deref()));
    let layout = RunLayout::new(args.output_folder.as_deref(), &name);
    print_run_setup(mode, paired, &required, layout.root());
    if !layout.create()? {
        notify(
            Notice::Warning,
            &format!(
                "Folder {} already exists, files in it may be overwritten",
                layout.root().display()
            ),
        );
    }

    let invocation = std::env::args().collect::<Vec<_>>().join(" ");
    let log = Arc::new(CommandLog::create(&layout.running_log(), &invocation)?);
    tracing::info!("Running log: {}", layout.running_log().display());

    let toolkit = build_toolkit(&toolchain, &config, &inputs, threads, log.clone())?;
    let thresholds = Thresholds::from(&config.thresholds);
    let settings = PipelineSettings {
        thresholds,
        workers: args.n_processes.unwrap_or(threads),
        max_open_buckets: args.max_open_buckets,
        show_progress: !args.no_progress,
    };

    print_stage(Stage::Reads);
    let outcome = Pipeline::new(settings).execute(&inputs, &layout, &toolkit)?;

    print_stage(Stage::Report);
    save_region_report(&layout.region_report(), &outcome)?;
    save_run_summary(
        &layout.run_summary(),
        &RunSummary::new(&name, thresholds, &outcome),
    )?;
    log.record("Run finished");

    print_totals("Run summary", text::totals(&outcome));
    println!("\n{}", text::region_table(&outcome));

    let failed = outcome.count("failed");
    if failed > 0 {
        notify(
            Notice::Warning,
            &format!(
                "{} region analyses failed; see the .analysis.log files in {}",
                failed,
                layout.root().display()
            ),
        );
    }
    if outcome.count("analyzed") == 0 {
        notify(
            Notice::Tip,
            "No region passed the thresholds; lower --min-reads-to-use-region or --min-perc-reads-to-use-region",
        );
    }
    notify(
        Notice::Success,
        &format!("Analysis completed, results in {}", layout.root().display()),
    );
    Ok(())
}

fn build_toolkit(
    toolchain: &Toolchain,
    config: &Config,
    inputs: &RunInputs,
    threads: usize,
    log: Arc<CommandLog>,
) -> crate::Result<Toolkit> {
    let policy = AlignmentPolicy::from_config(&config.alignment, threads);

    let trimmer: Option<Box<dyn Trimmer>> = if config.trimming.enabled {
        Some(Box::new(Trimmomatic::new(toolchain, &config.trimming, log.clone())?))
    } else {
        None
    };
    let merger: Option<Box<dyn Merger>> = if inputs.reads.is_paired() {
        Some(Box::new(Flash::new(toolchain, config.merge.clone(), log.clone())?))
    } else {
        None
    };
    let reference: Option<Box<dyn ReferenceSequences>> = match &inputs.genome_index {
        Some(index) => Some(Box::new(GenomeReference::new(
            toolchain,
            index,
            &genome_dir(),
            log.clone(),
        )?)),
        None => None,
    };

    Ok(Toolkit {
        aligner: Box::new(Bowtie2::new(toolchain, policy, log.clone())?),
        trimmer,
        merger,
        analyzer: Box::new(Crispresso::new(toolchain, config.analysis.clone(), log)?),
        reference,
    })
}
