//! Replay command implementation
//!
//! Feeds a JSON-lines file of decoded events through a live session, the
//! same way a transport would, and prints the finalized message.
//!
//! `--charts` hydrates the chart blocks left after finalization. Finalization
//! re-segments the text and replaces the incremental blocks, so chart
//! references only survive in responses without text.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::load_sources;
use crate::citation::CitationExtractor;
use crate::config::Config;
use crate::stream::{
    abort_signal, hydrate_chart, run_session, EventResult, MapChartResolver, StreamAssembler,
    StreamEvent, StreamingMessage,
};

/// One line of the replay file. Blank lines yield `None`; `[DONE]` is the
/// end-of-stream sentinel.
pub fn parse_event_line(line: &str) -> Option<serde_json::Result<StreamEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == "[DONE]" {
        return Some(Ok(StreamEvent::Done));
    }
    Some(serde_json::from_str(line))
}

pub async fn run(
    config: &Config,
    events: &Path,
    sources: Option<&Path>,
    charts: Option<&Path>,
) -> Result<()> {
    let content = tokio::fs::read_to_string(events)
        .await
        .with_context(|| format!("Failed to read {}", events.display()))?;
    let sources = sources.map(load_sources).transpose()?;
    let resolver = match charts {
        Some(path) => {
            let raw = super::read_input(path)?;
            let resolver: MapChartResolver = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid chart specs in {}", path.display()))?;
            Some(resolver)
        }
        None => None,
    };

    let mut assembler = StreamAssembler::with_extractor(
        StreamingMessage::assistant(),
        CitationExtractor::new(&config.citations),
    );
    if let Some(sources) = sources {
        assembler.set_structured_sources(sources);
    }

    let (tx, rx) = mpsc::channel::<EventResult>(64);
    let (_abort, abort_rx) = abort_signal();

    let lines: Vec<String> = content.lines().map(String::from).collect();
    let producer = tokio::spawn(async move {
        for (index, line) in lines.iter().enumerate() {
            let event = match parse_event_line(line) {
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!(line = index + 1, error = %e, "Dropping malformed event");
                    continue;
                }
                None => continue,
            };
            if tx.send(Ok(event)).await.is_err() {
                break;
            }
        }
    });

    let state = run_session(&mut assembler, rx, abort_rx).await;
    producer.await.context("Event producer panicked")?;
    info!(state = state.as_str(), "Replay finished");

    let mut message = assembler.into_message();
    if let Some(resolver) = &resolver {
        let pending: Vec<String> = message
            .blocks
            .iter()
            .filter_map(|b| b.as_chart())
            .filter(|c| !c.is_hydrated())
            .map(|c| c.id.clone())
            .collect();
        for block_id in pending {
            if let Err(e) = hydrate_chart(&mut message, &block_id, resolver).await {
                warn!(block_id = %block_id, error = %e, "Chart left unhydrated");
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
