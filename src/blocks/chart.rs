//! Table → chart inference
//!
//! Best-effort classification of a table into a bar, line or pie chart and
//! conversion into chart-ready series. Never fails: unparseable numbers
//! become `0`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::{ChartBlock, TableBlock};
use crate::config::ChartConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Pie => "pie",
        }
    }
}

/// One category of a chart: its label plus one value per series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub data: Vec<ChartPoint>,
    pub data_keys: Vec<String>,
}

fn re_time_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:(?:19|20)\d{2}|q[1-4]|jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b",
        )
        .expect("re_time_label: pattern is valid and should always compile")
    })
}

fn re_leading_float() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?")
            .expect("re_leading_float: pattern is valid and should always compile")
    })
}

/// Leading-number parse: `"12.5%"` → 12.5, `"abc"` → None
fn parse_leading_float(raw: &str) -> Option<f64> {
    re_leading_float()
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|f| f.is_finite())
}

/// Series value: currency symbols and thousands separators are ignored
fn parse_series_value(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    parse_leading_float(&cleaned).unwrap_or(0.0)
}

fn has_time_labels(table: &TableBlock) -> bool {
    table
        .rows
        .iter()
        .filter_map(|row| row.first())
        .any(|label| re_time_label().is_match(label))
}

/// Classify with the default settings
pub fn detect_chart_type(table: &TableBlock) -> ChartType {
    detect_chart_type_with(table, &ChartConfig::default())
}

/// Time-like first column → line; small two-column table → pie; else bar
pub fn detect_chart_type_with(table: &TableBlock, config: &ChartConfig) -> ChartType {
    if has_time_labels(table) {
        ChartType::Line
    } else if table.columns.len() == 2 && table.rows.len() <= config.pie_max_rows {
        ChartType::Pie
    } else {
        ChartType::Bar
    }
}

/// Series keys from the non-label headers. A header equal to `name` or to an
/// earlier key gets a `_2`, `_3`, ... suffix so it never shadows the point
/// label or another series.
fn series_keys(columns: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::with_capacity(columns.len().saturating_sub(1));
    for column in columns.iter().skip(1) {
        let taken = |k: &str| k == "name" || keys.iter().any(|existing| existing == k);
        let mut key = column.clone();
        let mut n = 2;
        while taken(&key) {
            key = format!("{}_{}", column, n);
            n += 1;
        }
        keys.push(key);
    }
    keys
}

/// Convert table rows into chart series. `data` has one point per row.
pub fn table_to_chart_data(table: &TableBlock, chart_type: ChartType) -> ChartData {
    let label_of = |row: &[String]| row.first().cloned().unwrap_or_default();

    match chart_type {
        ChartType::Pie => {
            let data = table
                .rows
                .iter()
                .map(|row| {
                    let value = row
                        .get(1)
                        .and_then(|v| parse_leading_float(v))
                        .unwrap_or(0.0);
                    ChartPoint {
                        name: label_of(row),
                        values: BTreeMap::from([("value".to_string(), value)]),
                    }
                })
                .collect();
            ChartData {
                chart_type,
                data,
                data_keys: vec!["value".to_string()],
            }
        }
        ChartType::Bar | ChartType::Line => {
            let data_keys = series_keys(&table.columns);
            let data = table
                .rows
                .iter()
                .map(|row| ChartPoint {
                    name: label_of(row),
                    values: data_keys
                        .iter()
                        .enumerate()
                        .map(|(i, key)| {
                            let value = row.get(i + 1).map(|v| parse_series_value(v)).unwrap_or(0.0);
                            (key.clone(), value)
                        })
                        .collect(),
                })
                .collect();
            ChartData {
                chart_type,
                data,
                data_keys,
            }
        }
    }
}

/// Chart view of a table block, ready to render without hydration
pub fn chart_block_from_table(
    table: &TableBlock,
    id: impl Into<String>,
    config: &ChartConfig,
) -> ChartBlock {
    let chart_type = detect_chart_type_with(table, config);
    let chart = table_to_chart_data(table, chart_type);
    let meta = table.meta.clone().unwrap_or_default();

    ChartBlock {
        id: id.into(),
        title: meta.title,
        subtitle: meta.subtitle,
        spec_type: chart_type.as_str().to_string(),
        spec: Some(json!(chart)),
        data_ref: None,
    }
}
