//! Citations command implementation

use anyhow::Result;
use std::path::Path;

use super::{load_sources, preview, read_input};
use crate::citation::CitationExtractor;
use crate::config::Config;

pub fn run(config: &Config, file: &Path, sources: Option<&Path>, json: bool) -> Result<()> {
    let content = read_input(file)?;
    let sources = sources.map(load_sources).transpose()?;

    let extractor = CitationExtractor::new(&config.citations);
    let citations = extractor.extract(&content, sources.as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&citations)?);
        return Ok(());
    }

    if citations.is_empty() {
        println!("No citations found in {}.", file.display());
        return Ok(());
    }

    println!(
        "{:<8} {:<11} {:<6} {:<30} {}",
        "ID", "Type", "Page", "Label", "Path"
    );
    println!("{}", "-".repeat(100));

    for citation in &citations {
        let page = citation
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<11} {:<6} {:<30} {}",
            citation.id,
            citation.file_type.as_str(),
            page,
            preview(&citation.label, 30),
            citation.path,
        );
    }

    println!("\n{} citation(s)", citations.len());
    Ok(())
}
