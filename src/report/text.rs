use crate::core::dispatcher::RegionStatus;
use crate::core::pipeline::RunOutcome;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Console table of every region with its read support and status.
pub fn region_table(outcome: &RunOutcome) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(
        ["Region", "Reads", "% aligned", "Status", "Genes"]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan)),
    );

    for region in &outcome.regions {
        let status = match &region.status {
            RegionStatus::Analyzed => Cell::new("analyzed").fg(Color::Green),
            RegionStatus::Failed(_) => Cell::new(region.status.to_string()).fg(Color::Red),
            RegionStatus::Skipped(_) => Cell::new(region.status.to_string()).fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&region.name),
            Cell::new(region.decision.reads).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", region.decision.percentage))
                .set_alignment(CellAlignment::Right),
            status,
            Cell::new(region.genes.as_deref().unwrap_or("")),
        ]);
    }
    table
}

/// Read totals as label/value pairs.
pub fn totals(outcome: &RunOutcome) -> Vec<(&'static str, String)> {
    let totals = &outcome.run.totals;
    let prep = &totals.preparation;
    let mut rows = vec![
        ("Mode", outcome.run.mode.to_string()),
        ("Input reads", prep.input_reads.to_string()),
        ("Processed reads", totals.processed_reads.to_string()),
    ];
    if prep.merged {
        rows.push(("Unmerged pairs", prep.unmerged_pairs.to_string()));
    }
    if let Some(length) = prep.average_processed_length {
        rows.push(("Average read length", format!("{:.1}", length)));
    }
    rows.push(("Aligned reads", totals.aligned_reads.to_string()));
    rows.push(("Unassigned reads", totals.unassigned_reads.to_string()));
    rows.push((
        "Regions analyzed",
        format!("{} of {}", outcome.count("analyzed"), outcome.regions.len()),
    ));
    rows.push(("Regions failed", outcome.count("failed").to_string()));
    rows
}
