/// Console output of a run: stage headers, the setup block, status lines and
/// the totals table. Everything here writes to stdout; diagnostics go through
/// `tracing` on stderr.
use crate::core::mode::OperatingMode;
use crate::tools::Tool;
use colored::*;
use std::path::Path;

/// Top-level stages announced on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dependencies,
    Reads,
    Report,
}

impl Stage {
    fn position(self) -> usize {
        match self {
            Stage::Dependencies => 1,
            Stage::Reads => 2,
            Stage::Report => 3,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Stage::Dependencies => "Checking dependencies and inputs",
            Stage::Reads => "Preparing, demultiplexing and analyzing reads",
            Stage::Report => "Writing reports",
        }
    }
}

pub fn print_stage(stage: Stage) {
    let width = terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| w as usize)
        .unwrap_or(80)
        .min(60);
    println!(
        "\n{} {}",
        format!("[{}/3]", stage.position()).cyan(),
        stage.title().bold()
    );
    println!("{}", "─".repeat(width).dimmed());
}

/// What the run is about to do, once dependencies are resolved.
pub fn print_run_setup(mode: OperatingMode, paired: bool, tools: &[Tool], output: &Path) {
    let tools = tools
        .iter()
        .map(|t| t.binary_name())
        .collect::<Vec<_>>()
        .join(", ");
    let lines = [
        ("Mode", mode.description().to_string()),
        (
            "Reads",
            if paired { "paired-end" } else { "single-end" }.to_string(),
        ),
        ("Tools", tools),
        ("Output", output.display().to_string()),
    ];

    println!("\n{} {}", "ℹ".cyan(), "Run setup".bold());
    for (label, value) in lines {
        println!("  {} {:<7} {}", "•".dimmed(), format!("{}:", label), value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Success,
    Warning,
    Tip,
}

pub fn notify(kind: Notice, message: &str) {
    match kind {
        Notice::Success => println!("\n{} {}", "✓".green().bold(), message),
        Notice::Warning => println!("\n{} {}", "⚠".yellow(), message.yellow()),
        Notice::Tip => println!("\n{} {}", "→".cyan(), message.dimmed()),
    }
}

/// Two-column table of run totals.
pub fn print_totals(title: &str, rows: Vec<(&str, String)>) {
    use comfy_table::modifiers::UTF8_ROUND_CORNERS;
    use comfy_table::presets::UTF8_FULL;
    use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(title).add_attribute(Attribute::Bold).fg(Color::Cyan),
            Cell::new(""),
        ]);

    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(value)
                .fg(Color::Green)
                .set_alignment(CellAlignment::Right),
        ]);
    }

    println!("\n{}", table);
}

/// Honors `NO_COLOR` and `CLICOLOR=0`.
pub fn init() {
    let disabled =
        std::env::var_os("NO_COLOR").is_some() || std::env::var("CLICOLOR").as_deref() == Ok("0");
    if disabled {
        colored::control::set_override(false);
    }
}
