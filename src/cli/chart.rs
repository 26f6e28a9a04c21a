//! Chart command implementation

use anyhow::Result;
use std::path::Path;

use super::read_input;
use crate::blocks::{detect_chart_type_with, segment_blocks, table_to_chart_data};
use crate::config::Config;

pub fn run(config: &Config, file: &Path) -> Result<()> {
    let content = read_input(file)?;
    let blocks = segment_blocks(&content, "chart");

    let tables: Vec<_> = blocks.iter().filter_map(|b| b.as_table()).collect();
    if tables.is_empty() {
        println!("No tables found in {}.", file.display());
        return Ok(());
    }

    for table in tables {
        let chart_type = detect_chart_type_with(table, &config.charts);
        let chart = table_to_chart_data(table, chart_type);

        println!(
            "📈 {} → {} ({} points, series: {})",
            table.id,
            chart_type.as_str(),
            chart.data.len(),
            chart.data_keys.join(", ")
        );
        println!("{}", serde_json::to_string_pretty(&chart)?);
        println!();
    }

    Ok(())
}
