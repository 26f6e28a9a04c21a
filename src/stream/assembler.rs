//! Event fold for one in-flight assistant message

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{SessionState, StreamEvent, StreamingMessage, ToolCall};
use crate::blocks::{segment_blocks, ChartBlock, ContentBlock, TextBlock};
use crate::citation::{CitationExtractor, StructuredSource};

/// Folds decoded events into a [`StreamingMessage`].
///
/// Every fold is synchronous and total. Once the session reaches a terminal
/// state further events are ignored.
pub struct StreamAssembler {
    message: StreamingMessage,
    state: SessionState,
    saw_error: bool,
    chart_count: usize,
    structured_sources: Vec<StructuredSource>,
    extractor: CitationExtractor,
}

impl StreamAssembler {
    pub fn new(message: StreamingMessage) -> Self {
        Self::with_extractor(message, CitationExtractor::default())
    }

    pub fn with_extractor(message: StreamingMessage, extractor: CitationExtractor) -> Self {
        Self {
            message,
            state: SessionState::Idle,
            saw_error: false,
            chart_count: 0,
            structured_sources: vec![],
            extractor,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn message(&self) -> &StreamingMessage {
        &self.message
    }

    /// Mutable access for effects outside the fold, such as chart hydration
    pub fn message_mut(&mut self) -> &mut StreamingMessage {
        &mut self.message
    }

    pub fn into_message(self) -> StreamingMessage {
        self.message
    }

    /// Sources returned out-of-band by a retrieval tool, used at finalization
    pub fn set_structured_sources(&mut self, sources: Vec<StructuredSource>) {
        self.structured_sources = sources;
    }

    /// Apply one event. Events after a terminal state are ignored.
    pub fn apply(&mut self, event: StreamEvent) {
        if self.state.is_terminal() {
            warn!(
                message_id = %self.message.id,
                state = self.state.as_str(),
                event = event.kind(),
                "Ignoring event after session ended"
            );
            return;
        }
        if self.state == SessionState::Idle {
            self.state = SessionState::Streaming;
        }
        debug!(message_id = %self.message.id, event = event.kind(), "Fold event");

        match event {
            StreamEvent::TextDelta { delta } => self.on_text_delta(&delta),
            StreamEvent::ToolCall { name, args } => {
                self.message.tool_calls.push(ToolCall::running(name, args));
            }
            StreamEvent::ToolOutput { name, output } => self.on_tool_output(&name, output),
            StreamEvent::ChartReference {
                data_ref,
                title,
                subtitle,
                spec_type,
            } => {
                let id = format!("{}-chart-{}", self.message.id, self.chart_count);
                self.chart_count += 1;
                self.message.blocks.push(ContentBlock::Chart(ChartBlock {
                    id,
                    title,
                    subtitle,
                    spec_type: spec_type.unwrap_or_else(|| "unknown".to_string()),
                    spec: None,
                    data_ref: Some(data_ref),
                }));
            }
            StreamEvent::Error { message } => self.on_error(&message),
            StreamEvent::Done => self.finalize(),
            StreamEvent::Unknown => {
                warn!(message_id = %self.message.id, "Unknown event type, skipping");
            }
        }
    }

    fn on_text_delta(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        self.message.content.push_str(delta);
        self.sync_open_text_block();
    }

    /// Mirror the full content into the single open text block
    fn sync_open_text_block(&mut self) {
        let open_id = self.message.open_text_block_id();
        let content = &self.message.content;

        let existing = self.message.blocks.iter_mut().find_map(|b| match b {
            ContentBlock::Text(t) if t.id == open_id => Some(t),
            _ => None,
        });
        match existing {
            Some(block) => block.markdown.clone_from(content),
            None => self.message.blocks.push(ContentBlock::Text(TextBlock {
                id: open_id,
                markdown: content.clone(),
            })),
        }
    }

    /// Most recent running call with this name completes; no match is a no-op
    fn on_tool_output(&mut self, name: &str, output: Option<Value>) {
        let call = self
            .message
            .tool_calls
            .iter_mut()
            .rev()
            .find(|c| c.name == name && c.is_running());
        match call {
            Some(call) => {
                call.complete(output);
            }
            None => debug!(tool = name, "Tool output without a running call"),
        }
    }

    fn on_error(&mut self, message: &str) {
        warn!(message_id = %self.message.id, error = message, "Backend error");
        self.saw_error = true;

        if !self.message.content.is_empty() {
            self.message.content.push_str("\n\n");
        }
        self.message.content.push_str("**Error:** ");
        self.message.content.push_str(message);
        self.sync_open_text_block();

        for call in self.message.tool_calls.iter_mut() {
            call.fail();
        }
    }

    /// Stream ended (sentinel or transport closed). Re-derives blocks and
    /// citations from the final text; non-empty results replace what was
    /// built incrementally.
    pub fn finalize(&mut self) {
        if self.state.is_terminal() {
            return;
        }

        let blocks = segment_blocks(&self.message.content, &self.message.id);
        if !blocks.is_empty() {
            self.message.blocks = blocks;
        }

        let sources = (!self.structured_sources.is_empty()).then_some(&self.structured_sources[..]);
        let citations = self.extractor.extract(&self.message.content, sources);
        if !citations.is_empty() {
            self.message.citations = Some(citations);
        }

        self.state = if self.saw_error {
            SessionState::Errored
        } else {
            SessionState::Finalized
        };
        info!(
            message_id = %self.message.id,
            state = self.state.as_str(),
            blocks = self.message.blocks.len(),
            citations = self.message.citations.as_ref().map_or(0, Vec::len),
            tool_calls = self.message.tool_calls.len(),
            "Stream finalized"
        );
    }

    /// Transport failure: surface the error inline, then freeze the message
    pub fn fail(&mut self, message: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.state = SessionState::Streaming;
        self.on_error(message);
        self.finalize();
    }

    /// Caller cancelled. The partial message is kept as is.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!(message_id = %self.message.id, "Stream aborted");
        self.state = SessionState::Aborted;
    }
}
