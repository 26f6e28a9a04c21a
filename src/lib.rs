//! mas-stream: interpretation pipeline for streamed assistant responses
//!
//! Turns decoded backend events into a structured message: typed content
//! blocks, tool call progress, chart references and source citations.

pub mod blocks;
pub mod citation;
pub mod cli;
pub mod config;
pub mod stream;

pub use blocks::{chart_block_from_table, detect_chart_type, segment_blocks, table_to_chart_data};
pub use blocks::{ChartData, ChartType, ContentBlock};
pub use citation::{extract_citations, Citation, CitationExtractor, FileType, StructuredSource};
pub use config::Config;
pub use stream::{
    run_session, SessionState, StreamAssembler, StreamEvent, StreamingMessage, ToolCall, ToolStatus,
};
