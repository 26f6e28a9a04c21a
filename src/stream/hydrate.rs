//! Lazy chart hydration
//!
//! A `chart.reference` event only carries a data reference. Resolving it to
//! a renderable spec is an injected capability so the core never performs
//! I/O itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::StreamingMessage;
use crate::blocks::ContentBlock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    #[error("no block with id {0}")]
    UnknownBlock(String),
    #[error("block {0} is not a chart")]
    NotAChart(String),
    #[error("chart block {0} has no data reference")]
    MissingRef(String),
    #[error("no chart spec for reference {0}")]
    NotFound(String),
    #[error("chart resolver failed: {0}")]
    Resolver(String),
}

/// Resolved chart specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_type: Option<String>,
    pub spec: Value,
}

#[async_trait]
pub trait ChartResolver: Send + Sync {
    async fn resolve_chart_spec(&self, data_ref: &str) -> Result<ChartSpec, HydrationError>;
}

/// Resolver backed by an in-memory map, e.g. loaded from a JSON file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MapChartResolver {
    specs: HashMap<String, ChartSpec>,
}

impl MapChartResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, data_ref: impl Into<String>, spec: ChartSpec) {
        self.specs.insert(data_ref.into(), spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[async_trait]
impl ChartResolver for MapChartResolver {
    async fn resolve_chart_spec(&self, data_ref: &str) -> Result<ChartSpec, HydrationError> {
        self.specs
            .get(data_ref)
            .cloned()
            .ok_or_else(|| HydrationError::NotFound(data_ref.to_string()))
    }
}

/// Fill in the spec of one chart block.
///
/// Returns `Ok(false)` when the block was already hydrated (the resolver is
/// not called). On error the block is left exactly as it was.
pub async fn hydrate_chart(
    message: &mut StreamingMessage,
    block_id: &str,
    resolver: &dyn ChartResolver,
) -> Result<bool, HydrationError> {
    let data_ref = {
        let chart = match message.block(block_id) {
            Some(ContentBlock::Chart(chart)) => chart,
            Some(_) => return Err(HydrationError::NotAChart(block_id.to_string())),
            None => return Err(HydrationError::UnknownBlock(block_id.to_string())),
        };
        if chart.is_hydrated() {
            debug!(block_id, "Chart already hydrated");
            return Ok(false);
        }
        chart
            .data_ref
            .clone()
            .ok_or_else(|| HydrationError::MissingRef(block_id.to_string()))?
    };

    let resolved = resolver.resolve_chart_spec(&data_ref).await.map_err(|e| {
        warn!(block_id, data_ref = %data_ref, error = %e, "Chart hydration failed");
        e
    })?;

    let chart = message
        .blocks
        .iter_mut()
        .find_map(|b| match b {
            ContentBlock::Chart(c) if c.id == block_id => Some(c),
            _ => None,
        })
        .ok_or_else(|| HydrationError::UnknownBlock(block_id.to_string()))?;

    chart.spec = Some(resolved.spec);
    if let Some(spec_type) = resolved.spec_type {
        chart.spec_type = spec_type;
    }
    debug!(block_id, spec_type = %chart.spec_type, "Chart hydrated");
    Ok(true)
}
