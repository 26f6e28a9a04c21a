//! Typed message content
//!
//! A message is rendered from an ordered list of [`ContentBlock`]s. Blocks
//! belong to exactly one message; ids are derived from the message id.

pub mod chart;
mod segment;

pub use chart::{
    chart_block_from_table, detect_chart_type, detect_chart_type_with, table_to_chart_data,
    ChartData, ChartPoint, ChartType,
};
pub use segment::{is_table_line, segment_blocks, split_table_row};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::citation::Citation;

/// One self-contained unit of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text(TextBlock),
    Table(TableBlock),
    Chart(ChartBlock),
    Image(ImageBlock),
    Citation(CitationBlock),
}

impl ContentBlock {
    pub fn id(&self) -> &str {
        match self {
            ContentBlock::Text(b) => &b.id,
            ContentBlock::Table(b) => &b.id,
            ContentBlock::Chart(b) => &b.id,
            ContentBlock::Image(b) => &b.id,
            ContentBlock::Citation(b) => &b.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentBlock::Text(_) => "text",
            ContentBlock::Table(_) => "table",
            ContentBlock::Chart(_) => "chart",
            ContentBlock::Image(_) => "image",
            ContentBlock::Citation(_) => "citation",
        }
    }

    pub fn as_table(&self) -> Option<&TableBlock> {
        match self {
            ContentBlock::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_chart(&self) -> Option<&ChartBlock> {
        match self {
            ContentBlock::Chart(c) => Some(c),
            _ => None,
        }
    }
}

/// Raw Markdown span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: String,
    pub markdown: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

/// Rectangular table: every row has exactly `columns.len()` cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBlock {
    pub id: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<TableMeta>,
}

impl TableBlock {
    /// Build a table, rejecting an empty header or ragged rows
    pub fn new(id: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Option<Self> {
        if columns.is_empty() || rows.iter().any(|r| r.len() != columns.len()) {
            return None;
        }
        Some(Self {
            id: id.into(),
            columns,
            rows,
            meta: None,
        })
    }
}

/// Chart, possibly waiting on hydration (`spec` null, `data_ref` set)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBlock {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub spec_type: String,
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_ref: Option<String>,
}

impl ChartBlock {
    pub fn is_hydrated(&self) -> bool {
        self.spec.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationBlock {
    pub id: String,
    pub citation: Citation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_rejects_ragged_rows() {
        let cols = vec!["A".to_string(), "B".to_string()];
        assert!(TableBlock::new("t", cols.clone(), vec![vec!["1".into(), "2".into()]]).is_some());
        assert!(TableBlock::new("t", cols, vec![vec!["1".into()]]).is_none());
        assert!(TableBlock::new("t", vec![], vec![]).is_none());
    }

    #[test]
    fn test_block_serialization_shape() {
        let block = ContentBlock::Chart(ChartBlock {
            id: "m-chart-0".into(),
            title: Some("Revenue".into()),
            subtitle: None,
            spec_type: "bar".into(),
            spec: None,
            data_ref: Some("genie://q/42".into()),
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "chart",
                "id": "m-chart-0",
                "title": "Revenue",
                "specType": "bar",
                "spec": null,
                "dataRef": "genie://q/42"
            })
        );
        let back: ContentBlock = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.kind(), "chart");
        assert!(!back.as_chart().unwrap().is_hydrated());
    }
}
