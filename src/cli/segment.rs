//! Segment command implementation

use anyhow::Result;
use std::path::Path;
use uuid::Uuid;

use super::{preview, read_input};
use crate::blocks::{segment_blocks, ContentBlock};

pub fn run(file: &Path, message_id: Option<String>, json: bool) -> Result<()> {
    let content = read_input(file)?;
    let message_id = message_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let blocks = segment_blocks(&content, &message_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }

    if blocks.is_empty() {
        println!("{} is empty.", file.display());
        return Ok(());
    }

    for block in &blocks {
        match block {
            ContentBlock::Text(text) => {
                println!("📝 {} ({} chars)", text.id, text.markdown.chars().count());
                println!("   {}", preview(&text.markdown, 76));
            }
            ContentBlock::Table(table) => {
                println!(
                    "📊 {} ({} columns x {} rows)",
                    table.id,
                    table.columns.len(),
                    table.rows.len()
                );
                println!("   {}", table.columns.join(" | "));
            }
            other => println!("   {} ({})", other.id(), other.kind()),
        }
    }

    Ok(())
}
