use crate::cli::formatter::{notify, Notice};
use crate::core::config::{default_config, save_config};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Where to write the configuration
    #[arg(short, long, default_value = "regionplex.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite it",
            args.output.display()
        );
    }

    save_config(&args.output, &default_config())?;
    notify(
        Notice::Success,
        &format!("Default configuration written to {}", args.output.display()),
    );
    notify(
        Notice::Tip,
        &format!(
            "Edit it and pass it with: regionplex run --config {}",
            args.output.display()
        ),
    );
    Ok(())
}
