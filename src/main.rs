use clap::Parser;
use colored::*;
use regionplex::cli::{Cli, Commands};
use regionplex::RegionplexError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize logging with REGIONPLEX_LOG environment variable support
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let log_level =
        std::env::var("REGIONPLEX_LOG").unwrap_or_else(|_| default_level.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    regionplex::cli::formatter::init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<RegionplexError>() {
            Some(RegionplexError::Configuration(_)) => 2,
            Some(RegionplexError::MissingDependency { .. }) => 3,
            Some(RegionplexError::InputAccess { .. }) => 4,
            Some(RegionplexError::Validation(_)) => 5,
            Some(RegionplexError::ExternalTool { .. })
            | Some(RegionplexError::Preprocessing(_))
            | Some(RegionplexError::Merge(_)) => 6,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let num_threads = if cli.threads == 0 {
        num_cpus::get()
    } else {
        cli.threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| RegionplexError::Configuration(format!("Cannot start thread pool: {}", e)))?;

    if cli.verbose > 0 {
        eprintln!("Using {} threads", num_threads);
    }

    match cli.command {
        Commands::Run(mut args) => {
            args.threads = num_threads;
            regionplex::cli::commands::run::run(args)
        }
        Commands::Tools(args) => regionplex::cli::commands::tools::run(args),
        Commands::Config(args) => regionplex::cli::commands::config::run(args),
    }
}
