//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub citations: CitationConfig,

    #[serde(default)]
    pub charts: ChartConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Citation extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationConfig {
    /// Characters of context captured on each side of a match
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,

    /// Cloud/volume path prefixes recognized as bare citations
    #[serde(default = "default_volume_prefixes")]
    pub volume_prefixes: Vec<String>,
}

/// Table-to-chart inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Largest two-column table still shown as a pie
    #[serde(default = "default_pie_max_rows")]
    pub pie_max_rows: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_snippet_radius() -> usize {
    100
}

fn default_volume_prefixes() -> Vec<String> {
    vec!["/Volumes/".to_string()]
}

fn default_pie_max_rows() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            snippet_radius: default_snippet_radius(),
            volume_prefixes: default_volume_prefixes(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            pie_max_rows: default_pie_max_rows(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./mas-stream.yaml (current directory)
    /// 3. ~/.config/mas-stream/mas-stream.yaml
    pub fn load(path: &str) -> Result<Self> {
        let mut search_paths = vec![
            PathBuf::from(shellexpand::tilde(path).to_string()),
            PathBuf::from("mas-stream.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("mas-stream/mas-stream.yaml"));
        }

        for search_path in &search_paths {
            if search_path.exists() {
                return Self::from_file(search_path);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Parse a specific YAML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}
