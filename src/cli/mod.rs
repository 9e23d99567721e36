pub mod commands;
pub mod formatter;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "regionplex",
    version,
    about = "Demultiplex pooled sequencing reads by region and analyze CRISPR editing per region",
    long_about = "Regionplex assigns the reads of a pooled run to amplicons or to genomic regions \
                  discovered from alignments, decides which regions have enough supporting reads, \
                  and runs a per-region editing analysis on each of them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads to use (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Demultiplex reads and analyze every supported region
    Run(commands::run::RunArgs),

    /// Show which external tools are available
    Tools(commands::tools::ToolsArgs),

    /// Write a configuration file with every default filled in
    Config(commands::config::ConfigArgs),
}
