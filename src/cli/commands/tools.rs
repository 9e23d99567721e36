use crate::core::config::{default_config, load_config};
use crate::core::paths::describe_paths;
use crate::tools::tool_status;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use std::path::PathBuf;

#[derive(Args)]
pub struct ToolsArgs {
    /// Configuration file with [tools] overrides
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn run(args: ToolsArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    let statuses = tool_status(&config.tools);

    match args.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&statuses)?;
            println!("{}", json);
        }
        _ => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);

            table.set_header(vec![
                Cell::new("Tool").add_attribute(Attribute::Bold),
                Cell::new("Command").add_attribute(Attribute::Bold),
                Cell::new("Status").add_attribute(Attribute::Bold),
                Cell::new("Path").add_attribute(Attribute::Bold),
            ]);

            for status in &statuses {
                let (state, path) = match &status.path {
                    Some(path) => (
                        Cell::new("found").fg(Color::Green),
                        path.display().to_string(),
                    ),
                    None => (
                        Cell::new("missing").fg(Color::Red),
                        status.tool.install_hint().to_string(),
                    ),
                };
                table.add_row(vec![
                    Cell::new(status.tool.display_name()),
                    Cell::new(status.tool.binary_name()),
                    state,
                    Cell::new(path),
                ]);
            }

            println!("\nExternal Tools");
            println!("{}", table);
            println!("\n{}", describe_paths());
        }
    }

    Ok(())
}
