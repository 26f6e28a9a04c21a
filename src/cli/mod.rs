//! Command implementations for the `mas-stream` binary

pub mod chart;
pub mod citations;
pub mod replay;
pub mod segment;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::citation::StructuredSource;

/// Read a whole input file as text
pub fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Load retrieval sources from a JSON array file. Non-object entries are
/// kept as empty sources and later skipped by the extractor.
pub fn load_sources(path: &Path) -> Result<Vec<StructuredSource>> {
    let content = read_input(path)?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid sources JSON in {}", path.display()))?;
    let Value::Array(items) = value else {
        anyhow::bail!("{} must contain a JSON array of sources", path.display());
    };
    Ok(items.into_iter().map(StructuredSource::from).collect())
}

/// Single-line preview for table output
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
